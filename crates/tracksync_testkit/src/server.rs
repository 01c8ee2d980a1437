//! In-process fake of the remote document API.
//!
//! [`FakeGistServer`] implements [`HttpClient`] directly, so engines and
//! clients under test talk to it without sockets. It models:
//! - documents with files, owner, visibility and timestamps
//! - tokens with a login and a scope list
//! - a request quota with remaining/reset headers
//! - injected failures (transport errors or bare statuses)
//! - a gate that holds one request in flight until released

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tracksync_collection::RemoteDocument;
use tracksync_remote::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RemoteConfig};

/// Base URL the fake answers on.
pub const FAKE_API_URL: &str = "https://gist.fake.test";

/// Quota reported by a fresh server.
const DEFAULT_QUOTA: u64 = 5000;

/// A document held by the fake.
#[derive(Debug, Clone)]
struct FakeGist {
    files: BTreeMap<String, String>,
    owner: String,
    public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct FakeToken {
    login: String,
    scopes: Vec<String>,
}

/// A failure to inject into the next request.
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    /// The transport fails with this message.
    Network(String),
    /// The server answers with this status and an API message body.
    Status(u16),
}

#[derive(Debug)]
struct ServerState {
    gists: HashMap<String, FakeGist>,
    tokens: HashMap<String, FakeToken>,
    failures: VecDeque<InjectedFailure>,
    remaining: u64,
    reset_at: DateTime<Utc>,
    requests: Vec<HttpRequest>,
}

#[derive(Debug)]
struct Gate {
    /// `Some(filter)` while armed; a `None` filter holds any method.
    armed: Mutex<Option<Option<HttpMethod>>>,
    entered: Notify,
    release: Semaphore,
}

/// Fake remote document server.
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone)]
pub struct FakeGistServer {
    state: Arc<Mutex<ServerState>>,
    gate: Arc<Gate>,
}

impl Default for FakeGistServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGistServer {
    /// Creates an empty server with a full quota.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                gists: HashMap::new(),
                tokens: HashMap::new(),
                failures: VecDeque::new(),
                remaining: DEFAULT_QUOTA,
                reset_at: Utc::now() + ChronoDuration::hours(1),
                requests: Vec::new(),
            })),
            gate: Arc::new(Gate {
                armed: Mutex::new(None),
                entered: Notify::new(),
                release: Semaphore::new(0),
            }),
        }
    }

    /// Returns a remote configuration pointing at the fake.
    pub fn config() -> RemoteConfig {
        RemoteConfig::default().with_api_base_url(FAKE_API_URL)
    }

    /// Returns the server as a shareable HTTP client.
    pub fn client(&self) -> Arc<Self> {
        Arc::new(self.clone())
    }

    /// Creates an empty document owned by `octo`.
    pub fn create_gist(&self, id: &str, public: bool) {
        let now = Utc::now();
        self.state.lock().gists.insert(
            id.to_string(),
            FakeGist {
                files: BTreeMap::new(),
                owner: "octo".to_string(),
                public,
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// Sets the raw content of one file of a document.
    ///
    /// # Panics
    ///
    /// Panics if the document does not exist.
    pub fn put_file(&self, id: &str, filename: &str, content: impl Into<String>) {
        let mut state = self.state.lock();
        let gist = state.gists.get_mut(id).expect("unknown gist");
        gist.files.insert(filename.to_string(), content.into());
        gist.updated_at = Utc::now();
    }

    /// Stores `document` as the current document file.
    pub fn put_document(&self, id: &str, document: &RemoteDocument) {
        let content = document.to_json().expect("document encodes");
        self.put_file(id, &Self::config().filename, content);
    }

    /// Returns the raw content of one file.
    pub fn file(&self, id: &str, filename: &str) -> Option<String> {
        self.state.lock().gists.get(id)?.files.get(filename).cloned()
    }

    /// Returns the parsed current document file.
    pub fn document(&self, id: &str) -> Option<RemoteDocument> {
        let content = self.file(id, &Self::config().filename)?;
        RemoteDocument::parse(&content).ok()
    }

    /// Registers a token.
    pub fn add_token(&self, token: &str, login: &str, scopes: &[&str]) {
        self.state.lock().tokens.insert(
            token.to_string(),
            FakeToken {
                login: login.to_string(),
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
            },
        );
    }

    /// Sets the remaining request quota.
    pub fn set_quota_remaining(&self, remaining: u64) {
        self.state.lock().remaining = remaining;
    }

    /// Returns the quota reset time the server reports.
    pub fn quota_reset_at(&self) -> DateTime<Utc> {
        self.state.lock().reset_at
    }

    /// Queues a failure for the next request that reaches the server.
    pub fn inject_failure(&self, failure: InjectedFailure) {
        self.state.lock().failures.push_back(failure);
    }

    /// Returns every request received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Returns the number of requests received with `method`.
    pub fn count(&self, method: HttpMethod) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    /// Forgets recorded requests.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// Holds the next request in flight until [`release`](Self::release).
    pub fn hold_next_request(&self) {
        *self.gate.armed.lock() = Some(None);
    }

    /// Holds the next request with `method` in flight until
    /// [`release`](Self::release). Other requests pass through.
    pub fn hold_next(&self, method: HttpMethod) {
        *self.gate.armed.lock() = Some(Some(method));
    }

    /// Waits until a request is being held.
    pub async fn wait_until_held(&self) {
        self.gate.entered.notified().await;
    }

    /// Releases the held request.
    pub fn release(&self) {
        self.gate.release.add_permits(1);
    }

    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut state = self.state.lock();

        if let Some(failure) = state.failures.pop_front() {
            return match failure {
                InjectedFailure::Network(message) => Err(message),
                InjectedFailure::Status(status) => {
                    Ok(quota_headers(&state, error_body(status, "injected failure")))
                }
            };
        }

        if state.remaining == 0 {
            let body = error_body(403, "API rate limit exceeded");
            return Ok(quota_headers(&state, body));
        }
        state.remaining -= 1;

        let path = request
            .url
            .strip_prefix(FAKE_API_URL)
            .unwrap_or(&request.url)
            .to_string();
        let (route, _query) = path.split_once('?').unwrap_or((path.as_str(), ""));

        let token = request
            .header_value("authorization")
            .and_then(|v| v.strip_prefix("token "))
            .map(str::to_owned);
        let caller = match &token {
            Some(t) => match state.tokens.get(t) {
                Some(known) => Some(known.clone()),
                None => return Ok(quota_headers(&state, error_body(401, "Bad credentials"))),
            },
            None => None,
        };

        let response = match (request.method, route) {
            (HttpMethod::Get, "/user") => match &caller {
                Some(c) => HttpResponse::new(200, json!({ "login": c.login }).to_string()),
                None => error_body(401, "Requires authentication"),
            },
            (HttpMethod::Get, "/gists") => match &caller {
                Some(c) => HttpResponse::new(200, "[]")
                    .with_headers([("x-oauth-scopes", c.scopes.join(", ").as_str())]),
                None => error_body(401, "Requires authentication"),
            },
            (method, route) => match route.strip_prefix("/gists/") {
                Some(id) => match method {
                    HttpMethod::Get => get_gist(&state, id, caller.as_ref()),
                    HttpMethod::Patch => patch_gist(&mut state, id, caller.as_ref(), request),
                },
                None => error_body(404, "Not Found"),
            },
        };
        Ok(quota_headers(&state, response))
    }
}

fn error_body(status: u16, message: &str) -> HttpResponse {
    HttpResponse::new(status, json!({ "message": message }).to_string())
}

fn quota_headers(state: &ServerState, response: HttpResponse) -> HttpResponse {
    let remaining = state.remaining.to_string();
    let reset = state.reset_at.timestamp().to_string();
    response.with_headers([
        ("x-ratelimit-remaining", remaining.as_str()),
        ("x-ratelimit-reset", reset.as_str()),
    ])
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn get_gist(state: &ServerState, id: &str, caller: Option<&FakeToken>) -> HttpResponse {
    let Some(gist) = state.gists.get(id) else {
        return error_body(404, "Not Found");
    };
    if !gist.public && caller.is_none() {
        return error_body(403, "Forbidden");
    }

    let files: serde_json::Map<String, Value> = gist
        .files
        .iter()
        .map(|(name, content)| {
            (
                name.clone(),
                json!({
                    "filename": name,
                    "content": content,
                    "truncated": false,
                    "raw_url": format!("{FAKE_API_URL}/raw/{id}/{name}"),
                }),
            )
        })
        .collect();

    let body = json!({
        "id": id,
        "files": files,
        "owner": { "login": gist.owner },
        "created_at": timestamp(gist.created_at),
        "updated_at": timestamp(gist.updated_at),
        "public": gist.public,
    });
    HttpResponse::new(200, body.to_string())
}

fn patch_gist(
    state: &mut ServerState,
    id: &str,
    caller: Option<&FakeToken>,
    request: &HttpRequest,
) -> HttpResponse {
    let Some(caller) = caller else {
        return error_body(401, "Requires authentication");
    };
    if !caller.scopes.iter().any(|s| s == "gist") {
        return error_body(403, "Resource not accessible by personal access token");
    }
    let Some(gist) = state.gists.get_mut(id) else {
        return error_body(404, "Not Found");
    };

    let body: Value = match request.body.as_deref().map(serde_json::from_str) {
        Some(Ok(body)) => body,
        _ => return error_body(422, "Problems parsing JSON"),
    };
    let Some(files) = body.get("files").and_then(Value::as_object) else {
        return error_body(422, "Invalid request");
    };

    for (name, file) in files {
        match file.get("content").and_then(Value::as_str) {
            Some(content) => {
                gist.files.insert(name.clone(), content.to_string());
            }
            None => {
                gist.files.remove(name);
            }
        }
    }
    gist.updated_at = Utc::now();
    HttpResponse::new(200, json!({ "id": id }).to_string())
}

#[async_trait]
impl HttpClient for FakeGistServer {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.state.lock().requests.push(request.clone());
        let hold = {
            let mut armed = self.gate.armed.lock();
            match *armed {
                Some(filter) if filter.map_or(true, |m| m == request.method) => {
                    *armed = None;
                    true
                }
                _ => false,
            }
        };
        if hold {
            self.gate.entered.notify_one();
            if let Ok(permit) = self.gate.release.acquire().await {
                permit.forget();
            }
        }
        self.handle(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::tracks;
    use tracksync_remote::{Credential, DocumentState, GistClient, RemoteErrorKind};

    fn client(server: &FakeGistServer) -> GistClient<FakeGistServer> {
        GistClient::new(server.client(), FakeGistServer::config())
    }

    #[tokio::test]
    async fn fetch_missing_file_then_write_creates_it() {
        let server = FakeGistServer::new();
        server.create_gist("g1", false);
        server.add_token("t1", "octo", &["gist"]);
        let credential = Credential::new("g1", Some("t1".into()));
        let client = client(&server);

        let fetched = client.fetch_document(&credential).await.unwrap();
        assert_eq!(fetched.state, DocumentState::Missing);

        client
            .write_collection(&credential, "tracks", &tracks([1, 2]))
            .await
            .unwrap();
        let doc = server.document("g1").unwrap();
        assert_eq!(doc.collection("tracks").unwrap(), tracks([1, 2]));
        assert_eq!(server.count(HttpMethod::Patch), 1);
    }

    #[tokio::test]
    async fn private_gist_requires_token() {
        let server = FakeGistServer::new();
        server.create_gist("g1", false);
        let err = client(&server)
            .fetch_document(&Credential::anonymous("g1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RemoteErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn exhausted_quota_is_rate_limited() {
        let server = FakeGistServer::new();
        server.create_gist("g1", true);
        server.set_quota_remaining(0);
        let err = client(&server)
            .fetch_document(&Credential::anonymous("g1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RemoteErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn write_without_scope_is_forbidden() {
        let server = FakeGistServer::new();
        server.create_gist("g1", true);
        server.add_token("t1", "octo", &["repo"]);
        let err = client(&server)
            .write_collection(&Credential::new("g1", Some("t1".into())), "tracks", &tracks([1]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RemoteErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let server = FakeGistServer::new();
        server.create_gist("g1", true);
        server.inject_failure(InjectedFailure::Network("reset".into()));
        server.inject_failure(InjectedFailure::Status(502));
        let client = client(&server);
        let credential = Credential::anonymous("g1");

        let first = client.fetch_document(&credential).await.unwrap_err();
        assert_eq!(first.kind(), RemoteErrorKind::Network);
        let second = client.fetch_document(&credential).await.unwrap_err();
        assert_eq!(second.kind(), RemoteErrorKind::Network);
        assert!(client.fetch_document(&credential).await.is_ok());
        assert_eq!(server.request_count(), 3);
    }

    #[tokio::test]
    async fn gate_holds_a_request() {
        let server = FakeGistServer::new();
        server.create_gist("g1", true);
        server.hold_next_request();

        let handle = {
            let client = client(&server);
            tokio::spawn(async move {
                client
                    .fetch_document(&Credential::anonymous("g1"))
                    .await
                    .is_ok()
            })
        };

        server.wait_until_held().await;
        assert!(!handle.is_finished());
        assert_eq!(server.request_count(), 1);
        server.release();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn gate_can_target_one_method() {
        let server = FakeGistServer::new();
        server.create_gist("g1", false);
        server.add_token("t1", "octo", &["gist"]);
        server.hold_next(HttpMethod::Patch);

        let credential = Credential::new("g1", Some("t1".into()));
        let handle = {
            let client = client(&server);
            let credential = credential.clone();
            tokio::spawn(async move {
                client
                    .write_collection(&credential, "tracks", &tracks([1]))
                    .await
                    .is_ok()
            })
        };

        server.wait_until_held().await;
        // The read went through; the write is held.
        assert_eq!(server.count(HttpMethod::Get), 1);
        assert_eq!(server.count(HttpMethod::Patch), 1);
        assert!(client(&server).fetch_document(&credential).await.is_ok());

        server.release();
        assert!(handle.await.unwrap());
        let document = server.document("g1").unwrap();
        assert_eq!(document.collection("tracks").unwrap(), tracks([1]));
    }
}
