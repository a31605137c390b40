// Request plumbing shared by the registry and inbox clients.

use chrono::Utc;
use courtside_common::{bearer, AuthSession};
use reqwest::{header, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::PushError;

/// Fails with `Unauthenticated` unless the session can be used right now.
pub(crate) fn ensure_session(session: &AuthSession) -> Result<(), PushError> {
    if session.access_token.trim().is_empty() {
        return Err(PushError::Unauthenticated(
            "no access token in session".to_string(),
        ));
    }
    if !session.is_usable_at(Utc::now()) {
        return Err(PushError::Unauthenticated("session expired".to_string()));
    }
    Ok(())
}

pub(crate) fn authorized(request: RequestBuilder, session: &AuthSession) -> RequestBuilder {
    request.header(header::AUTHORIZATION, bearer(&session.access_token))
}

/// Sends the request and decodes a JSON body, mapping non-2xx statuses to
/// [`PushError::Http`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, PushError> {
    let response = request.send().await?;
    let response = check_status(response).await?;
    Ok(response.json::<T>().await?)
}

async fn check_status(response: Response) -> Result<Response, PushError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(PushError::Http {
        status: status.as_u16(),
        message: backend_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        }),
    })
}

// Error bodies usually carry `{success: false, message}`; fall back to raw text.
fn backend_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

/// Turns a body without `success: true` into [`PushError::Rejected`].
pub(crate) fn require_success(
    success: bool,
    message: Option<&str>,
    operation: &str,
) -> Result<(), PushError> {
    if success {
        Ok(())
    } else {
        Err(PushError::Rejected(
            message
                .filter(|m| !m.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} was not acknowledged", operation)),
        ))
    }
}
