//! `load`, `save` and `approve` commands.

use super::{read_collection, CliError, CliResult, Context};
use serde::Serialize;
use std::path::Path;
use tracksync_collection::Collection;
use tracksync_engine::{RemoteWrite, SaveOutcome, SyncError};
use tracksync_store::keys;

/// JSON view of a [`SaveOutcome`].
#[derive(Debug, Serialize)]
pub struct SaveSummary {
    key: String,
    records: usize,
    local_saved: bool,
    remote: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_error: Option<String>,
}

impl SaveSummary {
    fn new(outcome: &SaveOutcome, records: usize) -> Self {
        Self {
            key: outcome.key.clone(),
            records,
            local_saved: outcome.local_saved,
            remote: match outcome.remote {
                RemoteWrite::Skipped => "skipped",
                RemoteWrite::Written => "written",
                RemoteWrite::Failed(_) => "failed",
            },
            remote_error: outcome.remote_error().map(|e| e.to_string()),
        }
    }

    fn text(&self) -> String {
        let mut line = format!(
            "{}: {} record(s), local {}, remote {}",
            self.key,
            self.records,
            if self.local_saved { "saved" } else { "NOT saved" },
            self.remote
        );
        if let Some(error) = &self.remote_error {
            line.push_str(&format!(" ({error})"));
        }
        line
    }
}

/// Prints a collection.
pub async fn load(ctx: &Context, key: &str) -> CliResult<()> {
    if keys::is_reserved(key) {
        return Err(SyncError::ReservedKey(key.to_string()).into());
    }
    let engine = ctx.engine()?;
    let collection = engine.load_data(key).await.unwrap_or_default();
    ctx.emit(&collection, || render(key, &collection))
}

/// Saves the collection read from `file` under `key`.
pub async fn save(ctx: &Context, key: &str, file: &Path) -> CliResult<()> {
    let data = read_collection(file)?;
    let engine = ctx.engine()?;
    let outcome = engine.save_data(key, &data).await?;

    let summary = SaveSummary::new(&outcome, data.len());
    ctx.emit(&summary, || summary.text())?;
    check(&outcome)
}

#[derive(Serialize)]
struct ApprovalSummary {
    approved: SaveSummary,
    tracks: SaveSummary,
}

/// Saves approved tracks and promotes them into the catalog.
pub async fn approve(ctx: &Context, file: &Path) -> CliResult<()> {
    let approved = read_collection(file)?;
    let engine = ctx.engine()?;
    let outcome = engine.save_approved_tracks(&approved).await;

    let summary = ApprovalSummary {
        approved: SaveSummary::new(&outcome.approved, approved.deduplicated().len()),
        tracks: SaveSummary::new(&outcome.tracks, outcome.promoted.len()),
    };
    ctx.emit(&summary, || {
        format!("{}\n{}", summary.approved.text(), summary.tracks.text())
    })?;
    check(&outcome.approved)?;
    check(&outcome.tracks)
}

fn check(outcome: &SaveOutcome) -> CliResult<()> {
    if !outcome.local_saved {
        return Err(CliError::Failed(format!(
            "{} was not saved locally",
            outcome.key
        )));
    }
    if let Some(error) = outcome.remote_error() {
        return Err(CliError::Failed(format!(
            "{} saved locally but not remotely: {error}",
            outcome.key
        )));
    }
    Ok(())
}

fn render(key: &str, collection: &Collection) -> String {
    if collection.is_empty() {
        return format!("{key}: empty");
    }
    let mut out = format!("{key}: {} record(s)", collection.len());
    for record in collection {
        out.push_str(&format!(
            "\n  {:>6}  {} / {}",
            record.id, record.title, record.artist
        ));
    }
    out
}
