//! Bearer token validation.

use crate::config::RemoteConfig;
use crate::error::{classify_status, RemoteError, RemoteErrorKind};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Header listing the scopes granted to a classic token.
const OAUTH_SCOPES: &str = "x-oauth-scopes";

/// The outcome of validating a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenVerdict {
    /// The identity endpoint accepted the token.
    pub valid: bool,
    /// The token carries the scope required for writes.
    pub has_required_scope: bool,
    /// Human-readable explanation.
    pub reason: String,
    /// Login the token belongs to, when valid.
    pub login: Option<String>,
    /// Kind of failure, when validation failed on a remote error.
    pub failure: Option<RemoteErrorKind>,
}

impl TokenVerdict {
    fn rejected(err: &RemoteError) -> Self {
        let reason = match err {
            RemoteError::Unauthorized => "token is invalid or expired".to_string(),
            other => other.to_string(),
        };
        Self {
            valid: false,
            has_required_scope: false,
            reason,
            login: None,
            failure: Some(err.kind()),
        }
    }

    /// Returns true if the token may be trusted for writes.
    pub fn is_usable(&self) -> bool {
        self.valid && self.has_required_scope
    }
}

#[derive(Deserialize)]
struct UserResponse {
    login: Option<String>,
}

/// Two-step token validator.
///
/// 1. `GET /user` with the token: a non-success status rejects it as
///    unauthorized, rate limited (remaining quota zero) or forbidden.
/// 2. `GET /gists` with the token: the scope-list header must contain the
///    required scope.
///
/// The validator only returns a verdict; persisting the token is the
/// caller's decision.
pub struct CredentialValidator<C: HttpClient> {
    http: Arc<C>,
    config: RemoteConfig,
}

impl<C: HttpClient> CredentialValidator<C> {
    /// Creates a validator.
    pub fn new(http: Arc<C>, config: RemoteConfig) -> Self {
        Self { http, config }
    }

    async fn get(&self, path: &str, token: &str) -> Result<HttpResponse, RemoteError> {
        let request = HttpRequest::get(self.config.url(path))
            .header("Accept", "application/vnd.github.v3+json")
            .header("Authorization", format!("token {token}"));
        let response = self
            .http
            .execute(request)
            .await
            .map_err(RemoteError::Network)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(classify_status(&response, path))
        }
    }

    /// Validates `token`.
    pub async fn validate(&self, token: &str) -> TokenVerdict {
        let token = token.trim();
        if token.is_empty() {
            return TokenVerdict {
                valid: false,
                has_required_scope: false,
                reason: "no token provided".to_string(),
                login: None,
                failure: Some(RemoteErrorKind::Unauthorized),
            };
        }

        let identity = match self.get("/user", token).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "identity check failed");
                return TokenVerdict::rejected(&e);
            }
        };
        let login = serde_json::from_str::<UserResponse>(&identity.body)
            .ok()
            .and_then(|u| u.login);

        let introspection = match self.get("/gists?per_page=1", token).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "scope introspection failed");
                return TokenVerdict {
                    login,
                    ..TokenVerdict::rejected(&e)
                };
            }
        };

        let required = self.config.required_scope.as_str();
        let (has_required_scope, reason) = match introspection.header(OAUTH_SCOPES) {
            Some(scopes) if scopes.split(',').any(|s| s.trim() == required) => {
                (true, format!("token is valid and has the {required:?} scope"))
            }
            Some(scopes) => (
                false,
                format!("token lacks the {required:?} scope (granted: {})", scopes.trim()),
            ),
            None => (
                false,
                format!("token scopes are not reported; cannot confirm the {required:?} scope"),
            ),
        };

        info!(login = ?login, has_required_scope, "token validated");
        TokenVerdict {
            valid: true,
            has_required_scope,
            reason,
            login,
            failure: None,
        }
    }
}
