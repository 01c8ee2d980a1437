//! Client for the shared remote document.

use crate::config::RemoteConfig;
use crate::credential::Credential;
use crate::error::{classify_status, RemoteError, RemoteResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracksync_collection::{Collection, RemoteDocument};

const ACCEPT: &str = "application/vnd.github.v3+json";

/// How the document content was found on the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentState {
    /// The document file exists and parsed in the current shape.
    Current,
    /// Neither the document file nor the legacy file exists. The document
    /// reads as empty and the file is created on the next write.
    Missing,
    /// Only the legacy bare-array file exists. It was read as `tracks`; the
    /// next write creates the document file and leaves the legacy file.
    Legacy,
    /// Content exists but does not parse. It reads as empty and the next
    /// write replaces it.
    Malformed(String),
}

/// Metadata of the remote document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GistMetadata {
    /// Login of the owner.
    pub owner: Option<String>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Whether the document is public.
    pub public: bool,
}

/// A fetched document.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Parsed content; empty for `Missing` and `Malformed`.
    pub document: RemoteDocument,
    /// How the content was found.
    pub state: DocumentState,
    /// Document metadata.
    pub metadata: GistMetadata,
}

impl FetchedDocument {
    /// Returns true if the next write must rewrite the document file even
    /// when no collection changed.
    pub fn needs_migration(&self) -> bool {
        matches!(
            self.state,
            DocumentState::Legacy | DocumentState::Malformed(_)
        )
    }
}

#[derive(Deserialize)]
struct GistResponse {
    #[serde(default)]
    files: HashMap<String, GistFile>,
    owner: Option<GistOwner>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    public: bool,
}

#[derive(Deserialize)]
struct GistFile {
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    raw_url: Option<String>,
}

#[derive(Deserialize)]
struct GistOwner {
    login: String,
}

/// Client for one remote document API.
///
/// All operations take the [`Credential`] explicitly so that the caller
/// owns credential state.
pub struct GistClient<C: HttpClient> {
    http: Arc<C>,
    config: RemoteConfig,
}

impl<C: HttpClient> GistClient<C> {
    /// Creates a client.
    pub fn new(http: Arc<C>, config: RemoteConfig) -> Self {
        Self { http, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn authorize(&self, request: HttpRequest, credential: &Credential) -> HttpRequest {
        let request = request.header("Accept", ACCEPT);
        match &credential.token {
            Some(token) => request.header("Authorization", format!("token {token}")),
            None => request,
        }
    }

    async fn send(&self, request: HttpRequest, credential: &Credential) -> RemoteResult<HttpResponse> {
        let request = self.authorize(request, credential);
        let response = self
            .http
            .execute(request)
            .await
            .map_err(RemoteError::Network)?;

        if response.is_success() {
            Ok(response)
        } else {
            let err = classify_status(&response, &credential.document_id);
            debug!(status = response.status, error = %err, "remote request failed");
            Err(err)
        }
    }

    fn document_url(&self, credential: &Credential) -> String {
        self.config
            .url(&format!("/gists/{}", credential.document_id))
    }

    /// Fetches and parses the whole document.
    ///
    /// A missing document file is not an error: the result is an empty
    /// document in state [`DocumentState::Missing`]. Unparseable content is
    /// not an error either: it reads as empty in state
    /// [`DocumentState::Malformed`].
    ///
    /// # Errors
    ///
    /// Returns the classified error for non-success statuses and
    /// [`RemoteError::Network`] for transport failures or an unreadable
    /// response envelope.
    pub async fn fetch_document(&self, credential: &Credential) -> RemoteResult<FetchedDocument> {
        let url = self.document_url(credential);
        let response = self.send(HttpRequest::get(url), credential).await?;

        let gist: GistResponse = serde_json::from_str(&response.body)
            .map_err(|e| RemoteError::network(format!("unreadable document response: {e}")))?;

        let metadata = GistMetadata {
            owner: gist.owner.map(|o| o.login),
            created_at: gist.created_at,
            updated_at: gist.updated_at,
            public: gist.public,
        };

        let (document, state) = if let Some(file) = gist.files.get(&self.config.filename) {
            let content = self.file_content(file, credential).await?;
            match RemoteDocument::parse(&content) {
                Ok(doc) => (doc, DocumentState::Current),
                Err(e) => {
                    warn!(file = %self.config.filename, error = %e, "document content is malformed; reading as empty");
                    (RemoteDocument::new(), DocumentState::Malformed(e.to_string()))
                }
            }
        } else if let Some(file) = gist.files.get(&self.config.legacy_filename) {
            let content = self.file_content(file, credential).await?;
            match RemoteDocument::parse_legacy(&content) {
                Ok(doc) => {
                    info!(file = %self.config.legacy_filename, "legacy document found; will migrate on next write");
                    (doc, DocumentState::Legacy)
                }
                Err(e) => {
                    warn!(file = %self.config.legacy_filename, error = %e, "legacy content is malformed; reading as empty");
                    (RemoteDocument::new(), DocumentState::Malformed(e.to_string()))
                }
            }
        } else {
            debug!(file = %self.config.filename, "document file absent; reading as empty");
            (RemoteDocument::new(), DocumentState::Missing)
        };

        Ok(FetchedDocument {
            document,
            state,
            metadata,
        })
    }

    /// Returns the file content, following `raw_url` for truncated files.
    async fn file_content(&self, file: &GistFile, credential: &Credential) -> RemoteResult<String> {
        match (&file.content, file.truncated, &file.raw_url) {
            (_, true, Some(raw_url)) => {
                debug!(url = %raw_url, "file content truncated; fetching raw");
                let response = self.send(HttpRequest::get(raw_url.clone()), credential).await?;
                Ok(response.body)
            }
            (Some(content), _, _) => Ok(content.clone()),
            (None, _, _) => Ok(String::new()),
        }
    }

    /// Replaces the content of the given files, leaving other files in the
    /// document untouched.
    ///
    /// # Errors
    ///
    /// Returns the classified error for non-success statuses and
    /// [`RemoteError::Network`] for transport failures.
    pub async fn patch_files(
        &self,
        credential: &Credential,
        files: &BTreeMap<String, String>,
    ) -> RemoteResult<()> {
        let files: serde_json::Map<String, serde_json::Value> = files
            .iter()
            .map(|(name, content)| (name.clone(), json!({ "content": content })))
            .collect();
        let body = json!({ "files": files }).to_string();

        let url = self.document_url(credential);
        self.send(HttpRequest::patch(url, body), credential).await?;
        Ok(())
    }

    /// Writes `document` to the document file, stamping `lastUpdated`.
    ///
    /// The legacy file, if any, is left in place.
    ///
    /// # Errors
    ///
    /// See [`GistClient::patch_files`].
    pub async fn write_document(
        &self,
        credential: &Credential,
        document: &RemoteDocument,
    ) -> RemoteResult<()> {
        let mut document = document.clone();
        document.touch(Utc::now());
        let content = document
            .to_json()
            .map_err(|e| RemoteError::MalformedDocument(e.to_string()))?;

        let files = BTreeMap::from([(self.config.filename.clone(), content)]);
        self.patch_files(credential, &files).await?;
        info!(document_id = %credential.document_id, "remote document written");
        Ok(())
    }

    /// Read-merge-write of one collection.
    ///
    /// Fetches the current document, replaces the `name` key with
    /// `collection`, and writes the whole document back, so sibling keys
    /// written by other clients survive.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; nothing is written if the
    /// read fails.
    pub async fn write_collection(
        &self,
        credential: &Credential,
        name: &str,
        collection: &Collection,
    ) -> RemoteResult<()> {
        let mut fetched = self.fetch_document(credential).await?;
        fetched
            .document
            .set_collection(name, collection)
            .map_err(|e| RemoteError::MalformedDocument(e.to_string()))?;
        debug!(key = name, records = collection.len(), state = ?fetched.state, "read-merge-write");
        self.write_document(credential, &fetched.document).await
    }
}
