//! `sync` command.

use super::{CliError, CliResult, Context};
use serde::Serialize;
use tracksync_engine::SyncReport;

#[derive(Debug, Serialize)]
struct CollectionSummary {
    name: String,
    local: usize,
    remote: usize,
    merged: usize,
    pulled: usize,
}

#[derive(Debug, Serialize)]
struct SyncSummary {
    collections: Vec<CollectionSummary>,
    pulled: usize,
    pushed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    push_error: Option<String>,
    push_skipped: bool,
    migrated: bool,
    local_saved: bool,
    retries: u32,
    duration_ms: u128,
}

impl From<&SyncReport> for SyncSummary {
    fn from(report: &SyncReport) -> Self {
        Self {
            collections: report
                .collections
                .iter()
                .map(|c| CollectionSummary {
                    name: c.name.clone(),
                    local: c.local,
                    remote: c.remote,
                    merged: c.merged,
                    pulled: c.pulled,
                })
                .collect(),
            pulled: report.pulled(),
            pushed: report.pushed,
            push_error: report.push_error.as_ref().map(|e| e.to_string()),
            push_skipped: report.push_skipped,
            migrated: report.migrated,
            local_saved: report.local_saved,
            retries: report.retries,
            duration_ms: report.duration.as_millis(),
        }
    }
}

impl SyncSummary {
    fn text(&self) -> String {
        let mut out = String::from("Sync complete");
        for c in &self.collections {
            out.push_str(&format!(
                "\n  {:<16} local {:>4}  remote {:>4}  merged {:>4}  pulled {:>4}",
                c.name, c.local, c.remote, c.merged, c.pulled
            ));
        }
        out.push_str(&format!(
            "\n  pushed: {}{}",
            if self.pushed { "yes" } else { "no" },
            if self.migrated { " (document migrated)" } else { "" }
        ));
        if let Some(error) = &self.push_error {
            out.push_str(&format!("\n  warning: write-back failed: {error}"));
        }
        if self.push_skipped {
            out.push_str("\n  note: no token configured; local-only records were not uploaded");
        }
        if !self.local_saved {
            out.push_str("\n  warning: some collections could not be stored locally");
        }
        out.push_str(&format!(
            "\n  retries: {}, took {}ms",
            self.retries, self.duration_ms
        ));
        out
    }
}

/// Runs one sync cycle.
pub async fn run(ctx: &Context) -> CliResult<()> {
    let engine = ctx.engine()?;
    let report = engine.sync().await?;
    let summary = SyncSummary::from(&report);
    ctx.emit(&summary, || summary.text())?;
    match report.push_error {
        Some(e) => Err(CliError::Failed(format!(
            "remote records merged locally but write-back failed: {e}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracksync_engine::CollectionSync;
    use tracksync_remote::RemoteError;

    #[test]
    fn summary_totals_pulled_records() {
        let report = SyncReport {
            collections: vec![
                CollectionSync {
                    name: "tracks".into(),
                    local: 2,
                    remote: 3,
                    merged: 4,
                    pulled: 2,
                },
                CollectionSync {
                    name: "playlist".into(),
                    local: 1,
                    remote: 0,
                    merged: 1,
                    pulled: 0,
                },
            ],
            pushed: true,
            push_error: None,
            push_skipped: false,
            migrated: false,
            local_saved: true,
            retries: 1,
            duration: Duration::from_millis(42),
        };

        let summary = SyncSummary::from(&report);
        assert_eq!(summary.pulled, 2);
        assert_eq!(summary.duration_ms, 42);

        let text = summary.text();
        assert!(text.contains("pushed: yes"));
        assert!(!text.contains("warning"));
        assert!(text.contains("tracks"));
    }

    #[test]
    fn failed_write_back_is_reported() {
        let report = SyncReport {
            collections: Vec::new(),
            pushed: false,
            push_error: Some(RemoteError::Forbidden("missing gist scope".into())),
            push_skipped: false,
            migrated: false,
            local_saved: true,
            retries: 0,
            duration: Duration::ZERO,
        };
        let summary = SyncSummary::from(&report);
        assert!(summary.text().contains("write-back failed"));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["pushed"], false);
        assert!(json["push_error"].is_string());
    }
}
