//! `validate` and `credential` commands.

use super::{CliError, CliResult, Context};
use serde::Serialize;
use tracing::info;
use tracksync_remote::{Credential, TokenVerdict};

#[derive(Debug, Serialize)]
struct VerdictView {
    valid: bool,
    has_required_scope: bool,
    usable: bool,
    reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl From<&TokenVerdict> for VerdictView {
    fn from(verdict: &TokenVerdict) -> Self {
        Self {
            valid: verdict.valid,
            has_required_scope: verdict.has_required_scope,
            usable: verdict.is_usable(),
            reason: verdict.reason.clone(),
            login: verdict.login.clone(),
            failure: verdict.failure.map(|kind| format!("{kind:?}")),
        }
    }
}

impl VerdictView {
    fn text(&self) -> String {
        let status = if self.usable {
            "usable"
        } else if self.valid {
            "valid but missing the required scope"
        } else {
            "rejected"
        };
        match &self.login {
            Some(login) => format!("Token {status} ({login}): {}", self.reason),
            None => format!("Token {status}: {}", self.reason),
        }
    }
}

/// JSON view of a stored credential. The token itself is never shown.
#[derive(Debug, Serialize)]
struct CredentialView {
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<String>,
    has_token: bool,
}

impl CredentialView {
    fn of(credential: Option<&Credential>) -> Self {
        Self {
            configured: credential.is_some(),
            document_id: credential.map(|c| c.document_id.clone()),
            has_token: credential.is_some_and(Credential::has_token),
        }
    }

    fn text(&self) -> String {
        match &self.document_id {
            Some(id) => format!(
                "Document: {id}\nToken:    {}",
                if self.has_token { "set" } else { "not set" }
            ),
            None => "No credential configured (local-only)".to_string(),
        }
    }
}

/// Checks a token without storing anything.
pub async fn validate(ctx: &Context, token: Option<String>) -> CliResult<()> {
    let token = match token.or_else(|| Credential::load(&ctx.store).and_then(|c| c.token)) {
        Some(token) => token,
        None => {
            return Err(CliError::Failed(
                "no token given and none stored".to_string(),
            ))
        }
    };

    let engine = ctx.engine()?;
    let verdict = engine.validate_credential(&token).await;
    let view = VerdictView::from(&verdict);
    ctx.emit(&view, || view.text())?;

    if verdict.is_usable() {
        Ok(())
    } else {
        Err(CliError::Failed(verdict.reason))
    }
}

/// Stores a credential. A token is validated first unless
/// `skip_validation` is set, and nothing is stored if it is rejected.
pub async fn set(
    ctx: &Context,
    document_id: &str,
    token: Option<String>,
    skip_validation: bool,
) -> CliResult<()> {
    let credential = Credential::new(document_id, token);
    if credential.document_id.is_empty() {
        return Err(CliError::Failed("document id must not be blank".to_string()));
    }

    if let (Some(token), false) = (&credential.token, skip_validation) {
        let engine = ctx.engine()?;
        let verdict = engine.validate_credential(token).await;
        if !verdict.is_usable() {
            return Err(CliError::Failed(format!(
                "token not stored: {}",
                verdict.reason
            )));
        }
        if let Some(login) = &verdict.login {
            info!(login = %login, "Token validated");
        }
    }

    if !credential.persist(&ctx.store) {
        return Err(CliError::Failed(
            "credential could not be written to the store".to_string(),
        ));
    }

    let view = CredentialView::of(Some(&credential));
    ctx.emit(&view, || format!("Credential stored\n{}", view.text()))
}

/// Shows the stored credential.
pub fn show(ctx: &Context) -> CliResult<()> {
    let credential = Credential::load(&ctx.store);
    let view = CredentialView::of(credential.as_ref());
    ctx.emit(&view, || view.text())
}

/// Removes the stored credential.
pub fn clear(ctx: &Context) -> CliResult<()> {
    if !Credential::clear(&ctx.store) {
        return Err(CliError::Failed(
            "credential could not be removed from the store".to_string(),
        ));
    }
    let view = CredentialView::of(None);
    ctx.emit(&view, || "Credential cleared".to_string())
}
