//! Configuration for the sync engine.

use chrono::Utc;
use std::time::Duration;
use tracksync_remote::{Credential, RemoteError};
use tracksync_store::{keys, LocalStore};

/// Which tiers the engine talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Local store only; every remote step is skipped.
    Local,
    /// Local store plus the shared remote document.
    Remote(Credential),
}

impl Backend {
    /// Resolves the backend from the credential keys of `store`.
    pub fn from_store(store: &LocalStore) -> Self {
        match Credential::load(store) {
            Some(credential) => Backend::Remote(credential),
            None => Backend::Local,
        }
    }

    /// Returns the credential, if remote.
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Backend::Local => None,
            Backend::Remote(credential) => Some(credential),
        }
    }
}

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Initial backend.
    pub backend: Backend,
    /// Minimum interval between the end of one sync and the start of the
    /// next, whatever the outcome.
    pub cooldown: Duration,
    /// Retry policy for the remote steps of a sync.
    pub retry: RetryPolicy,
    /// Collection keys reconciled by a sync, in order.
    pub synced_collections: Vec<String>,
}

impl EngineConfig {
    /// Creates a configuration for `backend` with default settings.
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            cooldown: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            synced_collections: keys::COLLECTIONS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Sets the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the collections reconciled by a sync.
    #[must_use]
    pub fn with_synced_collections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synced_collections = names.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Backend::Local)
    }
}

/// Retry behavior for remote calls made by a sync.
///
/// Only transient failures are retried: [`RemoteError::Network`] always,
/// and [`RemoteError::RateLimited`] when enabled and the quota resets
/// within `max_delay`. Credential and addressing failures need the user
/// and are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound of any single delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to wait for a quota reset and try again.
    pub retry_rate_limited: bool,
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retry_rate_limited: true,
        }
    }

    /// Creates a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            retry_rate_limited: false,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets whether rate-limited calls are retried.
    #[must_use]
    pub fn with_retry_rate_limited(mut self, enabled: bool) -> Self {
        self.retry_rate_limited = enabled;
        self
    }

    /// Calculates the backoff delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.max(0.0).powi(exponent);
        let delay_secs = delay_secs.min(self.max_delay.as_secs_f64());
        // Values Duration cannot hold fall back to no delay.
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::ZERO)
    }

    /// Returns how long to wait before attempt `attempt` (1-indexed retry)
    /// after `error`, or `None` if the call should not be retried.
    pub fn retry_delay(&self, attempt: u32, error: &RemoteError) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        match error {
            RemoteError::Network(_) => Some(self.delay_for_attempt(attempt)),
            RemoteError::RateLimited { reset_at } if self.retry_rate_limited => {
                let backoff = self.delay_for_attempt(attempt);
                let until_reset = match reset_at {
                    Some(reset_at) => (*reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
                    None => Duration::ZERO,
                };
                if until_reset > self.max_delay {
                    None
                } else {
                    Some(backoff.max(until_reset))
                }
            }
            _ => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn engine_config_builder() {
        let config = EngineConfig::new(Backend::Local)
            .with_cooldown(Duration::from_secs(60))
            .with_retry(RetryPolicy::no_retry())
            .with_synced_collections(["tracks"]);

        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.synced_collections, vec!["tracks".to_string()]);
    }

    #[test]
    fn default_syncs_all_collections() {
        let config = EngineConfig::default();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(
            config.synced_collections,
            vec!["tracks", "playlist", "approvedTracks"]
        );
    }

    #[test]
    fn backend_from_store() {
        let store = LocalStore::in_memory();
        assert_eq!(Backend::from_store(&store), Backend::Local);

        let credential = Credential::new("abc", Some("ghp_x".into()));
        credential.persist(&store);
        let backend = Backend::from_store(&store);
        assert_eq!(backend.credential(), Some(&credential));
    }

    #[test]
    fn retry_delay_calculation() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn retry_delay_respects_max() {
        let policy = RetryPolicy::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(5));
    }

    #[test]
    fn odd_multipliers_never_panic() {
        let negative = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(-2.0);
        assert_eq!(negative.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(negative.delay_for_attempt(2), Duration::ZERO);
        assert_eq!(negative.delay_for_attempt(3), Duration::ZERO);

        let nan = RetryPolicy::new(5).with_backoff_multiplier(f64::NAN);
        assert_eq!(nan.delay_for_attempt(2), Duration::ZERO);
    }

    #[test]
    fn only_transient_errors_retry() {
        let policy = RetryPolicy::new(3);
        assert!(policy.retry_delay(1, &RemoteError::network("reset")).is_some());
        assert!(policy.retry_delay(1, &RemoteError::Unauthorized).is_none());
        assert!(policy
            .retry_delay(1, &RemoteError::Forbidden("scope".into()))
            .is_none());
        assert!(policy
            .retry_delay(1, &RemoteError::NotFound("abc".into()))
            .is_none());
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::new(2);
        assert!(policy.retry_delay(1, &RemoteError::network("x")).is_some());
        assert!(policy.retry_delay(2, &RemoteError::network("x")).is_none());
        assert!(RetryPolicy::no_retry()
            .retry_delay(1, &RemoteError::network("x"))
            .is_none());
    }

    #[test]
    fn rate_limit_waits_for_near_reset_only() {
        let policy = RetryPolicy::new(3).with_max_delay(Duration::from_secs(10));

        let soon = RemoteError::RateLimited {
            reset_at: Some(Utc::now() + ChronoDuration::seconds(3)),
        };
        let delay = policy.retry_delay(1, &soon).unwrap();
        assert!(delay > Duration::from_secs(1));
        assert!(delay <= Duration::from_secs(3));

        let late = RemoteError::RateLimited {
            reset_at: Some(Utc::now() + ChronoDuration::hours(1)),
        };
        assert!(policy.retry_delay(1, &late).is_none());

        let disabled = policy.with_retry_rate_limited(false);
        assert!(disabled.retry_delay(1, &soon).is_none());
    }
}
