//! CLI command implementations.

pub mod credential;
pub mod data;
pub mod status;
pub mod sync;

use clap::ValueEnum;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracksync_collection::Collection;
use tracksync_engine::{Backend, EngineConfig, SyncEngine, SyncError};
use tracksync_remote::{RemoteConfig, RemoteError, ReqwestHttpClient};
use tracksync_store::{LocalStore, StorageError};

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The store directory could not be opened.
    #[error("cannot open store: {0}")]
    Store(#[from] StorageError),

    /// An input file could not be read.
    #[error("cannot read {path}: {source}")]
    Input {
        /// File that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Input or output JSON was invalid.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A sync failed or was throttled.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The command ran but did not fully succeed.
    #[error("{0}")]
    Failed(String),
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Shared state for one CLI invocation.
pub struct Context {
    /// Store directory.
    pub store_path: PathBuf,
    /// Local store rooted at `store_path`.
    pub store: LocalStore,
    /// Remote API settings.
    pub remote: RemoteConfig,
    /// Requested output format.
    pub format: Format,
}

impl Context {
    /// Opens the store directory and resolves remote settings.
    pub fn open(path: &Path, api_url: Option<String>, format: Format) -> CliResult<Self> {
        let store = LocalStore::open_dir(path)?;
        let mut remote = RemoteConfig::new();
        if let Some(url) = api_url {
            remote = remote.with_api_base_url(url.trim_end_matches('/'));
        }
        Ok(Self {
            store_path: path.to_path_buf(),
            store,
            remote,
            format,
        })
    }

    /// Builds an engine over the stored credential.
    ///
    /// Each invocation is a single process, so the cooldown only matters
    /// within it and is disabled.
    pub fn engine(&self) -> CliResult<SyncEngine<ReqwestHttpClient>> {
        let config =
            EngineConfig::new(Backend::from_store(&self.store)).with_cooldown(Duration::ZERO);
        Ok(SyncEngine::connect(
            self.store.clone(),
            self.remote.clone(),
            config,
        )?)
    }

    /// Prints `value` as JSON, or `text` in text mode.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> CliResult<()> {
        match self.format {
            Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
            Format::Text => println!("{}", text()),
        }
        Ok(())
    }
}

/// Reads a collection from `path`, or stdin when `path` is `-`.
pub fn read_collection(path: &Path) -> CliResult<Collection> {
    let input = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(path)
    }
    .map_err(|source| CliError::Input {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&input)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_collection_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracks.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "title": "Intro", "artist": "Band", "src": "a.mp3"}]"#,
        )
        .unwrap();

        let collection = read_collection(&path).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.records()[0].title, "Intro");
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = read_collection(&path).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn invalid_json_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_collection(&path), Err(CliError::Json(_))));
    }

    #[test]
    fn context_strips_trailing_slash() {
        let dir = tempdir().unwrap();
        let ctx = Context::open(
            dir.path(),
            Some("http://localhost:8080/".into()),
            Format::Text,
        )
        .unwrap();
        assert_eq!(ctx.remote.api_base_url, "http://localhost:8080");
    }
}
