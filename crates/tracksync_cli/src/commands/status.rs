//! `status` command.

use super::{CliResult, Context};
use serde::Serialize;
use tracksync_collection::Collection;
use tracksync_engine::RemoteHealth;
use tracksync_remote::{DocumentState, FetchedDocument};
use tracksync_store::keys;

#[derive(Debug, Serialize)]
struct LocalEntry {
    key: &'static str,
    records: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RemoteView {
    document_id: String,
    has_token: bool,
    health: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<DocumentView>,
}

#[derive(Debug, Serialize)]
struct DocumentView {
    state: String,
    collections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
    public: bool,
}

impl From<&FetchedDocument> for DocumentView {
    fn from(fetched: &FetchedDocument) -> Self {
        Self {
            state: match &fetched.state {
                DocumentState::Current => "current".to_string(),
                DocumentState::Missing => "missing".to_string(),
                DocumentState::Legacy => "legacy".to_string(),
                DocumentState::Malformed(reason) => format!("malformed: {reason}"),
            },
            collections: fetched.document.names().map(str::to_string).collect(),
            owner: fetched.metadata.owner.clone(),
            updated_at: fetched.metadata.updated_at.map(|t| t.to_rfc3339()),
            last_updated: fetched.document.last_updated().map(|t| t.to_rfc3339()),
            public: fetched.metadata.public,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusView {
    path: String,
    state: String,
    local: Vec<LocalEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<RemoteView>,
}

impl StatusView {
    fn text(&self) -> String {
        let mut out = format!("Store: {}\nState: {}\n\nLocal collections:", self.path, self.state);
        for entry in &self.local {
            match entry.records {
                Some(n) => out.push_str(&format!("\n  {:<16} {n} record(s)", entry.key)),
                None => out.push_str(&format!("\n  {:<16} (none)", entry.key)),
            }
        }
        match &self.remote {
            None => out.push_str("\n\nRemote: not configured (local-only)"),
            Some(remote) => {
                out.push_str(&format!(
                    "\n\nRemote document: {}\n  token:  {}\n  health: {}",
                    remote.document_id,
                    if remote.has_token { "set" } else { "not set" },
                    remote.health
                ));
                if let Some(doc) = &remote.document {
                    out.push_str(&format!("\n  file:   {}", doc.state));
                    if let Some(owner) = &doc.owner {
                        out.push_str(&format!("\n  owner:  {owner}"));
                    }
                    if let Some(updated) = &doc.last_updated {
                        out.push_str(&format!("\n  synced: {updated}"));
                    }
                    if !doc.collections.is_empty() {
                        out.push_str(&format!("\n  holds:  {}", doc.collections.join(", ")));
                    }
                }
            }
        }
        out
    }
}

/// Shows local collections, the credential and remote health.
pub async fn run(ctx: &Context) -> CliResult<()> {
    let engine = ctx.engine()?;

    let local = keys::COLLECTIONS
        .iter()
        .map(|&key| LocalEntry {
            key,
            records: ctx.store.get::<Collection>(key).map(|c| c.len()),
        })
        .collect();

    let remote = match engine.credential() {
        None => None,
        Some(credential) => {
            let document = engine.inspect_remote().await.ok();
            Some(RemoteView {
                document_id: credential.document_id.clone(),
                has_token: credential.has_token(),
                health: health_text(&engine.remote_health()),
                document: document.as_ref().map(DocumentView::from),
            })
        }
    };

    let view = StatusView {
        path: ctx.store_path.display().to_string(),
        state: engine.state().to_string(),
        local,
        remote,
    };
    ctx.emit(&view, || view.text())
}

fn health_text(health: &RemoteHealth) -> String {
    let text = health.to_string();
    if health.needs_attention() {
        format!("{text} (check the document id and token)")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Format;
    use tempfile::tempdir;
    use tracksync_collection::Record;

    #[test]
    fn text_for_local_only_store() {
        let view = StatusView {
            path: "/tmp/store".into(),
            state: "idle".into(),
            local: vec![
                LocalEntry {
                    key: keys::TRACKS,
                    records: Some(3),
                },
                LocalEntry {
                    key: keys::PLAYLIST,
                    records: None,
                },
            ],
            remote: None,
        };
        let text = view.text();
        assert!(text.contains("3 record(s)"));
        assert!(text.contains("(none)"));
        assert!(text.contains("local-only"));
    }

    #[test]
    fn misconfiguration_asks_for_attention() {
        let text = health_text(&RemoteHealth::Misconfigured("token is invalid".into()));
        assert!(text.contains("check the document id"));
        assert_eq!(health_text(&RemoteHealth::Healthy), "healthy");
    }

    #[tokio::test]
    async fn status_without_credential_makes_no_remote_call() {
        let dir = tempdir().unwrap();
        let ctx = Context::open(dir.path(), Some("http://127.0.0.1:9".into()), Format::Json)
            .unwrap();
        let tracks: Collection = vec![Record::new(1, "A", "B", "a.mp3")].into();
        assert!(ctx.store.set(keys::TRACKS, &tracks));

        run(&ctx).await.unwrap();
    }
}
