//! Remote credentials and their persistence in the local store.

use std::fmt;
use tracksync_store::{keys, LocalStore};

/// Address of the shared document plus an optional bearer token.
///
/// The token is required for private documents and to avoid anonymous
/// rate limits. `Debug` output never includes the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque id of the remote document.
    pub document_id: String,
    /// Bearer token.
    pub token: Option<String>,
}

impl Credential {
    /// Creates a credential. Blank tokens are treated as absent.
    pub fn new(document_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            document_id: document_id.into().trim().to_string(),
            token: token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }

    /// Creates a credential without a token.
    pub fn anonymous(document_id: impl Into<String>) -> Self {
        Self::new(document_id, None)
    }

    /// Returns true if a token is present.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Reads the credential from the fixed store keys.
    ///
    /// Returns `None` if no (non-blank) document id is stored.
    pub fn load(store: &LocalStore) -> Option<Self> {
        let document_id: String = store.get(keys::GIST_ID)?;
        if document_id.trim().is_empty() {
            return None;
        }
        let token: Option<String> = store.get(keys::GITHUB_TOKEN);
        Some(Self::new(document_id, token))
    }

    /// Writes the credential to the fixed store keys.
    ///
    /// A credential without a token removes any stored token. Returns false
    /// if the store rejected a write.
    pub fn persist(&self, store: &LocalStore) -> bool {
        let id_ok = store.set(keys::GIST_ID, &self.document_id);
        let token_ok = match &self.token {
            Some(token) => store.set(keys::GITHUB_TOKEN, token),
            None => store.remove(keys::GITHUB_TOKEN),
        };
        id_ok && token_ok
    }

    /// Removes both credential keys from the store.
    pub fn clear(store: &LocalStore) -> bool {
        let id_ok = store.remove(keys::GIST_ID);
        let token_ok = store.remove(keys::GITHUB_TOKEN);
        id_ok && token_ok
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("document_id", &self.document_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_absent() {
        let credential = Credential::new(" abc ", Some("  ".into()));
        assert_eq!(credential.document_id, "abc");
        assert!(!credential.has_token());
    }

    #[test]
    fn debug_redacts_token() {
        let credential = Credential::new("abc", Some("ghp_secret".into()));
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn persist_then_load() {
        let store = LocalStore::in_memory();
        let credential = Credential::new("abc", Some("ghp_x".into()));
        assert!(credential.persist(&store));
        assert_eq!(Credential::load(&store), Some(credential));
    }

    #[test]
    fn persist_without_token_removes_stored_token() {
        let store = LocalStore::in_memory();
        Credential::new("abc", Some("ghp_x".into())).persist(&store);
        Credential::anonymous("abc").persist(&store);

        let loaded = Credential::load(&store).unwrap();
        assert!(!loaded.has_token());
        assert!(!store.contains(keys::GITHUB_TOKEN));
    }

    #[test]
    fn load_without_document_id_is_none() {
        let store = LocalStore::in_memory();
        store.set(keys::GITHUB_TOKEN, &"ghp_x");
        assert!(Credential::load(&store).is_none());

        store.set(keys::GIST_ID, &"   ");
        assert!(Credential::load(&store).is_none());
    }

    #[test]
    fn clear_removes_both_keys() {
        let store = LocalStore::in_memory();
        Credential::new("abc", Some("ghp_x".into())).persist(&store);
        assert!(Credential::clear(&store));
        assert!(store.keys().is_empty());
    }
}
