//! The sync orchestrator.

use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::guard::FlagGuard;
use crate::outcome::{ApprovalOutcome, CollectionSync, RemoteWrite, SaveOutcome, SyncReport};
use crate::state::{RemoteHealth, SyncState, SyncStats};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracksync_collection::{merge, Collection, RemoteDocument};
use tracksync_remote::{
    Credential, CredentialValidator, FetchedDocument, GistClient, HttpClient, RemoteConfig,
    RemoteError, RemoteResult, ReqwestHttpClient, TokenVerdict,
};
use tracksync_store::{keys, LocalStore};

/// Write-back rounds per sync; later rounds only run when a save landed
/// during the previous one.
const PUSH_ROUNDS: u32 = 3;

/// Hook invoked with the `tracks` collection after a successful sync.
pub type RefreshCallback = Arc<dyn Fn(&Collection) + Send + Sync>;

/// Dual-tier persistence and sync engine.
///
/// Reads go to the local store first and fall back to one remote fetch.
/// Writes go to the local store first and then, when a credential is
/// configured, to the remote document by read-merge-write. [`sync`]
/// reconciles every synced collection in both directions.
///
/// Only `sync` is single-flight: a request while a sync runs, while the
/// refresh callback runs, or during the cooldown fails immediately with
/// [`SyncError::Throttled`] without any remote call.
///
/// [`sync`]: SyncEngine::sync
pub struct SyncEngine<C: HttpClient> {
    config: EngineConfig,
    store: LocalStore,
    client: GistClient<C>,
    validator: CredentialValidator<C>,
    credential: RwLock<Option<Credential>>,
    sync_in_progress: AtomicBool,
    refresh_in_progress: AtomicBool,
    cooldown_until: Mutex<Option<Instant>>,
    stats: RwLock<SyncStats>,
    health: RwLock<RemoteHealth>,
    on_refresh: RwLock<Option<RefreshCallback>>,
}

impl SyncEngine<ReqwestHttpClient> {
    /// Creates an engine that talks to the real API over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(store: LocalStore, remote: RemoteConfig, config: EngineConfig) -> RemoteResult<Self> {
        let http = ReqwestHttpClient::new(remote.timeout, &remote.user_agent)?;
        Ok(Self::new(store, Arc::new(http), remote, config))
    }
}

impl<C: HttpClient> SyncEngine<C> {
    /// Creates an engine over `store` and the `http` transport.
    pub fn new(store: LocalStore, http: Arc<C>, remote: RemoteConfig, config: EngineConfig) -> Self {
        let credential = config.backend.credential().cloned();
        let health = initial_health(credential.as_ref());
        Self {
            client: GistClient::new(Arc::clone(&http), remote.clone()),
            validator: CredentialValidator::new(http, remote),
            store,
            credential: RwLock::new(credential),
            sync_in_progress: AtomicBool::new(false),
            refresh_in_progress: AtomicBool::new(false),
            cooldown_until: Mutex::new(None),
            stats: RwLock::new(SyncStats::default()),
            health: RwLock::new(health),
            on_refresh: RwLock::new(None),
            config,
        }
    }

    /// Returns the local store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gets the current sync state.
    pub fn state(&self) -> SyncState {
        if self.sync_in_progress.load(Ordering::Acquire) {
            SyncState::Syncing
        } else if self.cooldown_remaining().is_some() {
            SyncState::Cooldown
        } else {
            SyncState::Idle
        }
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Gets what the engine last learned about the remote tier.
    pub fn remote_health(&self) -> RemoteHealth {
        self.health.read().clone()
    }

    /// Gets the active credential.
    pub fn credential(&self) -> Option<Credential> {
        self.credential.read().clone()
    }

    /// Replaces the active credential. `None` makes the engine local-only.
    ///
    /// The credential is not persisted; see [`Credential::persist`].
    pub fn set_credential(&self, credential: Option<Credential>) {
        *self.health.write() = initial_health(credential.as_ref());
        *self.credential.write() = credential;
    }

    /// Registers the refresh callback, replacing any previous one.
    pub fn set_refresh_callback<F>(&self, callback: F)
    where
        F: Fn(&Collection) + Send + Sync + 'static,
    {
        *self.on_refresh.write() = Some(Arc::new(callback));
    }

    /// Removes the refresh callback.
    pub fn clear_refresh_callback(&self) {
        *self.on_refresh.write() = None;
    }

    /// Clears both reentrancy flags.
    ///
    /// Recovery for a flag left set by an abandoned call. The cooldown is
    /// not affected.
    pub fn reset_flags(&self) {
        self.sync_in_progress.store(false, Ordering::Release);
        self.refresh_in_progress.store(false, Ordering::Release);
        info!("sync flags reset");
    }

    /// Validates `token` against the remote API. Nothing is stored.
    pub async fn validate_credential(&self, token: &str) -> TokenVerdict {
        self.validator.validate(token).await
    }

    /// Loads the collection stored under `key`.
    ///
    /// The local store is tried first. On a local miss with a credential
    /// configured, one remote fetch is made (no retry); a hit seeds the
    /// local store. Any failure reads as `None`, and so do the credential
    /// keys. The sync state is not touched.
    pub async fn load_data(&self, key: &str) -> Option<Collection> {
        if keys::is_reserved(key) {
            debug!(key, "credential key is not a collection");
            return None;
        }
        if let Some(local) = self.store.get::<Collection>(key) {
            return Some(local);
        }
        let credential = self.credential()?;

        debug!(key, "local miss; fetching remote");
        let fetched = self.client.fetch_document(&credential).await;
        self.note_remote(&fetched);
        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(key, error = %e, "remote fetch failed; reading as absent");
                return None;
            }
        };

        if !fetched.document.contains(key) {
            return None;
        }
        match fetched.document.collection(key) {
            Ok(collection) => {
                self.store.set(key, &collection);
                Some(collection)
            }
            Err(e) => {
                warn!(key, error = %e, "remote collection malformed; reading as absent");
                None
            }
        }
    }

    /// Saves `data` under `key`.
    ///
    /// The local write always happens first. With a credential configured
    /// the collection is then written to the remote document by
    /// read-merge-write; a remote failure is reported in the outcome and
    /// does not undo the local write.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ReservedKey`] for the credential keys; nothing
    /// is written.
    pub async fn save_data(&self, key: &str, data: &Collection) -> SyncResult<SaveOutcome> {
        if keys::is_reserved(key) {
            return Err(SyncError::ReservedKey(key.to_string()));
        }
        Ok(self.save_collection(key, data).await)
    }

    async fn save_collection(&self, key: &str, data: &Collection) -> SaveOutcome {
        let local_saved = self.store.set(key, data);

        let remote = match self.credential() {
            None => RemoteWrite::Skipped,
            Some(credential) => {
                let written = self.client.write_collection(&credential, key, data).await;
                self.note_remote(&written);
                match written {
                    Ok(()) => RemoteWrite::Written,
                    Err(e) => {
                        warn!(key, error = %e, "remote write failed; local copy kept");
                        RemoteWrite::Failed(e)
                    }
                }
            }
        };

        SaveOutcome {
            key: key.to_string(),
            local_saved,
            remote,
        }
    }

    /// Saves the moderation output and promotes it into `tracks`.
    ///
    /// `approved` is deduplicated and saved as `approvedTracks`, then merged
    /// into the current `tracks` collection, which is saved in turn. Both
    /// saves are attempted whatever the other's outcome. When promotion
    /// changes nothing, `tracks` is not written.
    pub async fn save_approved_tracks(&self, approved: &Collection) -> ApprovalOutcome {
        let approved = approved.deduplicated();
        let approved_outcome = self.save_collection(keys::APPROVED_TRACKS, &approved).await;

        let main = self.load_data(keys::TRACKS).await.unwrap_or_default();
        let promoted = merge(&main, &approved);
        let tracks_outcome = if promoted == main {
            debug!("promotion added no tracks; skipping write");
            SaveOutcome {
                key: keys::TRACKS.to_string(),
                local_saved: true,
                remote: RemoteWrite::Skipped,
            }
        } else {
            info!(
                added = promoted.len().saturating_sub(main.len()),
                "promoting approved tracks"
            );
            self.save_collection(keys::TRACKS, &promoted).await
        };

        ApprovalOutcome {
            approved: approved_outcome,
            tracks: tracks_outcome,
            promoted,
        }
    }

    /// Fetches the remote document once, without touching the sync state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConfigured`] without a credential, or the
    /// remote error.
    pub async fn inspect_remote(&self) -> SyncResult<FetchedDocument> {
        let credential = self.credential().ok_or(SyncError::NotConfigured)?;
        let fetched = self.client.fetch_document(&credential).await;
        self.note_remote(&fetched);
        Ok(fetched?)
    }

    /// Reconciles every synced collection with the remote document.
    ///
    /// One cycle: fetch the document (with retry), merge each remote
    /// collection into its local counterpart and store the result, then
    /// write the merged collections back if the remote lacks anything or
    /// needs migration. The refresh callback runs once at the end.
    ///
    /// Once the fetch succeeds the sync succeeds: a failed write-back is
    /// reported in [`SyncReport::push_error`], and a credential without a
    /// token skips the write-back ([`SyncReport::push_skipped`]). If a save
    /// lands while the write-back is in flight, the cycle fetches and
    /// merges again so the saved records reach both tiers.
    ///
    /// The cooldown starts when the cycle settles, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Throttled`] if a sync or refresh is running or the
    ///   cooldown has not elapsed
    /// - [`SyncError::NotConfigured`] without a credential
    /// - [`SyncError::Remote`] if the fetch failed; local data is left
    ///   untouched and the callback does not run
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let Some(_sync_guard) = FlagGuard::acquire(&self.sync_in_progress) else {
            return Err(self.throttled(None));
        };
        if self.refresh_in_progress.load(Ordering::Acquire) {
            return Err(self.throttled(None));
        }
        if let Some(remaining) = self.cooldown_remaining() {
            return Err(self.throttled(Some(remaining)));
        }
        let credential = self.credential().ok_or(SyncError::NotConfigured)?;

        info!(document_id = %credential.document_id, "sync started");
        let started = Instant::now();
        let result = self.run_cycle(&credential, started).await;
        self.start_cooldown();

        match result {
            Ok((report, tracks)) => {
                {
                    let mut stats = self.stats.write();
                    stats.syncs_completed += 1;
                    stats.records_pulled += report.pulled() as u64;
                    stats.pushes += u64::from(report.pushed);
                    stats.pushes_failed += u64::from(report.push_error.is_some());
                    stats.last_sync_time = Some(Utc::now());
                    stats.last_error = report.push_error.as_ref().map(|e| e.to_string());
                }
                info!(
                    pulled = report.pulled(),
                    pushed = report.pushed,
                    migrated = report.migrated,
                    converged = report.is_converged(),
                    duration_ms = report.duration.as_millis() as u64,
                    "sync completed"
                );
                self.fire_refresh(&tracks);
                Ok(report)
            }
            Err(e) => {
                {
                    let mut stats = self.stats.write();
                    stats.syncs_failed += 1;
                    stats.last_error = Some(e.to_string());
                }
                warn!(error = %e, "sync failed; local data unchanged");
                Err(SyncError::Remote(e))
            }
        }
    }

    async fn run_cycle(
        &self,
        credential: &Credential,
        started: Instant,
    ) -> RemoteResult<(SyncReport, Collection)> {
        let mut retries = 0u32;
        let fetched = self.fetch_with_retry(credential, &mut retries).await?;
        let needs_migration = fetched.needs_migration();

        let mut pass = self.reconcile(&fetched)?;
        let collections = pass.collections.clone();
        let mut local_saved = pass.local_saved;
        let push_skipped = pass.push && !credential.has_token();
        let mut pushed = false;
        let mut push_error = None;

        if push_skipped {
            info!("credential has no token; local-only records stay local");
        } else if pass.push {
            for round in 1..=PUSH_ROUNDS {
                debug!(round, migrate = needs_migration, "writing merged collections back");
                let written = self
                    .with_retry("write", &mut retries, || {
                        self.client.write_document(credential, &pass.document)
                    })
                    .await;
                self.note_remote(&written);
                if let Err(e) = written {
                    warn!(error = %e, "write-back failed; remote records merged locally");
                    push_error = Some(e);
                    break;
                }
                pushed = true;

                if round == PUSH_ROUNDS || !self.changed_since(&pass) {
                    break;
                }
                debug!(round, "local data changed during write-back; reconciling again");
                let fetched = match self.fetch_with_retry(credential, &mut retries).await {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        push_error = Some(e);
                        break;
                    }
                };
                pass = self.reconcile(&fetched)?;
                local_saved &= pass.local_saved;
                if !pass.push {
                    break;
                }
            }
        }

        let tracks = pass
            .merged
            .into_iter()
            .find(|(name, _)| name == keys::TRACKS)
            .map(|(_, merged)| merged)
            .or_else(|| self.store.get(keys::TRACKS))
            .unwrap_or_default();

        let report = SyncReport {
            collections,
            pushed,
            push_error,
            push_skipped,
            migrated: pushed && needs_migration,
            local_saved,
            retries,
            duration: started.elapsed(),
        };
        Ok((report, tracks))
    }

    async fn fetch_with_retry(
        &self,
        credential: &Credential,
        retries: &mut u32,
    ) -> RemoteResult<FetchedDocument> {
        let fetched = self
            .with_retry("fetch", retries, || self.client.fetch_document(credential))
            .await;
        self.note_remote(&fetched);
        fetched
    }

    /// Merges each remote collection into the local store and builds the
    /// document to write back.
    ///
    /// Each local collection is read and written with no await in between,
    /// so a save that completed earlier is merged, never overwritten.
    fn reconcile(&self, fetched: &FetchedDocument) -> RemoteResult<Pass> {
        let mut pass = Pass {
            collections: Vec::with_capacity(self.config.synced_collections.len()),
            document: fetched.document.clone(),
            merged: Vec::with_capacity(self.config.synced_collections.len()),
            push: fetched.needs_migration(),
            local_saved: true,
        };

        for name in &self.config.synced_collections {
            let remote = match fetched.document.collection(name) {
                Ok(remote) => remote,
                Err(e) => {
                    warn!(key = %name, error = %e, "remote collection malformed; replacing");
                    pass.push = true;
                    Collection::new()
                }
            };

            let local: Collection = self.store.get(name).unwrap_or_default();
            let merged = merge(&local, &remote);
            pass.push |= merged != remote;
            pass.document
                .set_collection(name, &merged)
                .map_err(|e| RemoteError::MalformedDocument(e.to_string()))?;
            if merged != local {
                pass.local_saved &= self.store.set(name, &merged);
            }

            pass.collections.push(CollectionSync {
                name: name.clone(),
                local: local.len(),
                remote: remote.len(),
                merged: merged.len(),
                pulled: merged.len().saturating_sub(local.deduplicated().len()),
            });
            pass.merged.push((name.clone(), merged));
        }
        Ok(pass)
    }

    /// Returns true if any local collection holds a record the last
    /// reconciled document lacks.
    fn changed_since(&self, pass: &Pass) -> bool {
        pass.merged.iter().any(|(name, merged)| {
            let current: Collection = self.store.get(name).unwrap_or_default();
            merge(merged, &current) != *merged
        })
    }

    /// Runs `call` under the retry policy.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        retries: &mut u32,
        mut call: F,
    ) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempt += 1;
            let Some(delay) = self.config.retry.retry_delay(attempt, &err) else {
                return Err(err);
            };

            debug!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying remote call"
            );
            *retries += 1;
            self.stats.write().retries += 1;
            tokio::time::sleep(delay).await;
        }
    }

    fn fire_refresh(&self, tracks: &Collection) {
        let Some(callback) = self.on_refresh.read().clone() else {
            return;
        };
        let Some(_refresh_guard) = FlagGuard::acquire(&self.refresh_in_progress) else {
            debug!("refresh already running; skipped");
            return;
        };
        callback(tracks);
    }

    fn note_remote<T>(&self, result: &RemoteResult<T>) {
        let health = RemoteHealth::from_result(result);
        if let RemoteHealth::Misconfigured(reason) = &health {
            warn!(reason = %reason, "remote rejected the configured credential or document id");
        }
        *self.health.write() = health;
    }

    fn throttled(&self, retry_after: Option<Duration>) -> SyncError {
        self.stats.write().syncs_throttled += 1;
        debug!(?retry_after, "sync request throttled");
        SyncError::Throttled { retry_after }
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        let until = (*self.cooldown_until.lock())?;
        until
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
    }

    fn start_cooldown(&self) {
        let until = Instant::now().checked_add(self.config.cooldown);
        *self.cooldown_until.lock() = until;
    }
}

/// One fetch merged into the local store.
struct Pass {
    collections: Vec<CollectionSync>,
    document: RemoteDocument,
    merged: Vec<(String, Collection)>,
    push: bool,
    local_saved: bool,
}

fn initial_health(credential: Option<&Credential>) -> RemoteHealth {
    match credential {
        Some(_) => RemoteHealth::Unverified,
        None => RemoteHealth::Unconfigured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Backend, RetryPolicy};
    use std::sync::atomic::AtomicUsize;
    use tracksync_remote::HttpMethod;
    use tracksync_testkit::{tracks, FakeGistServer, InjectedFailure};

    fn engine(server: &FakeGistServer, backend: Backend) -> SyncEngine<FakeGistServer> {
        let config = EngineConfig::new(backend)
            .with_cooldown(Duration::ZERO)
            .with_retry(RetryPolicy::new(3).with_initial_delay(Duration::from_millis(1)));
        SyncEngine::new(
            LocalStore::in_memory(),
            server.client(),
            FakeGistServer::config(),
            config,
        )
    }

    fn remote_server() -> (FakeGistServer, Backend) {
        let server = FakeGistServer::new();
        server.create_gist("g1", false);
        server.add_token("t1", "octo", &["gist"]);
        (server, Backend::Remote(Credential::new("g1", Some("t1".into()))))
    }

    #[tokio::test]
    async fn initial_state() {
        let server = FakeGistServer::new();
        let engine = engine(&server, Backend::Local);
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.remote_health(), RemoteHealth::Unconfigured);
        assert_eq!(engine.stats().syncs_completed, 0);
    }

    #[tokio::test]
    async fn sync_without_credential_is_not_configured() {
        let server = FakeGistServer::new();
        let engine = engine(&server, Backend::Local);
        assert_eq!(engine.sync().await.unwrap_err(), SyncError::NotConfigured);
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn stuck_flag_throttles_until_reset() {
        let (server, backend) = remote_server();
        let engine = engine(&server, backend);

        engine.sync_in_progress.store(true, Ordering::SeqCst);
        assert_eq!(engine.state(), SyncState::Syncing);
        assert!(matches!(
            engine.sync().await,
            Err(SyncError::Throttled { .. })
        ));

        engine.reset_flags();
        assert!(engine.sync().await.is_ok());
        assert_eq!(engine.stats().syncs_throttled, 1);
    }

    #[tokio::test]
    async fn refresh_flag_blocks_sync() {
        let (server, backend) = remote_server();
        let engine = engine(&server, backend);

        engine.refresh_in_progress.store(true, Ordering::SeqCst);
        assert!(matches!(
            engine.sync().await,
            Err(SyncError::Throttled { retry_after: None })
        ));
        assert_eq!(server.request_count(), 0);
        assert!(!engine.sync_in_progress.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn transient_fetch_failures_are_retried() {
        let (server, backend) = remote_server();
        let engine = engine(&server, backend);
        server.inject_failure(InjectedFailure::Network("reset".into()));
        server.inject_failure(InjectedFailure::Status(502));

        let report = engine.sync().await.unwrap();
        assert_eq!(report.retries, 2);
        assert_eq!(engine.stats().retries, 2);
        assert_eq!(server.count(HttpMethod::Get), 3);
    }

    #[tokio::test]
    async fn misconfiguration_is_not_retried() {
        let server = FakeGistServer::new();
        let engine = engine(&server, Backend::Remote(Credential::anonymous("missing")));

        let err = engine.sync().await.unwrap_err();
        assert_eq!(err, SyncError::Remote(RemoteError::NotFound("missing".into())));
        assert_eq!(server.request_count(), 1);
        assert!(engine.remote_health().needs_attention());
        assert_eq!(engine.stats().syncs_failed, 1);
    }

    #[tokio::test]
    async fn unchanged_sync_does_not_push() {
        let (server, backend) = remote_server();
        let engine = engine(&server, backend);

        let report = engine.sync().await.unwrap();
        assert!(!report.pushed);
        assert_eq!(server.count(HttpMethod::Patch), 0);
        assert_eq!(engine.remote_health(), RemoteHealth::Healthy);
    }

    #[tokio::test]
    async fn callback_cannot_reenter_refresh() {
        let (server, backend) = remote_server();
        let engine = Arc::new(engine(&server, backend));
        let calls = Arc::new(AtomicUsize::new(0));

        {
            let calls = Arc::clone(&calls);
            let weak = Arc::downgrade(&engine);
            engine.set_refresh_callback(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(engine) = weak.upgrade() {
                    assert_eq!(engine.state(), SyncState::Syncing);
                    engine.fire_refresh(&Collection::new());
                }
            });
        }

        engine.sync().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn set_credential_switches_backend() {
        let (server, backend) = remote_server();
        let engine = engine(&server, Backend::Local);

        let outcome = engine.save_data(keys::PLAYLIST, &tracks([1])).await.unwrap();
        assert_eq!(outcome.remote, RemoteWrite::Skipped);

        engine.set_credential(backend.credential().cloned());
        assert_eq!(engine.remote_health(), RemoteHealth::Unverified);
        let outcome = engine.save_data(keys::PLAYLIST, &tracks([1])).await.unwrap();
        assert_eq!(outcome.remote, RemoteWrite::Written);
    }
}
