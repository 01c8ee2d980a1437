//! Configuration for the remote document client.

use std::time::Duration;

/// Configuration for talking to the remote document API.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the API, without a trailing slash.
    pub api_base_url: String,
    /// Name of the file inside the document that holds the keyed object.
    pub filename: String,
    /// Name of the legacy file holding a bare array of tracks.
    pub legacy_filename: String,
    /// Scope a token must carry to be usable for writes.
    pub required_scope: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            filename: "tracksync-data.json".to_string(),
            legacy_filename: "tracks.json".to_string(),
            required_scope: "gist".to_string(),
            user_agent: format!("tracksync/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RemoteConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL. A trailing slash is dropped.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the document filename.
    #[must_use]
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = name.into();
        self
    }

    /// Sets the legacy filename.
    #[must_use]
    pub fn with_legacy_filename(mut self, name: impl Into<String>) -> Self {
        self.legacy_filename = name.into();
        self
    }

    /// Sets the scope required for writes.
    #[must_use]
    pub fn with_required_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scope = scope.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}
