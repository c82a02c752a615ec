//! Response handling shared by both clients.
//!
//! This is the only place remote failures are turned into
//! [`ConnectorError`] values, including the conflict classification.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use iotmig_connector::error::{ConnectorError, ConnectorResult};

/// Send a request, mapping transport failures.
pub(crate) async fn send(
    request: RequestBuilder,
    url: &str,
    timeout_secs: u64,
) -> ConnectorResult<Response> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ConnectorError::Timeout { timeout_secs }
        } else {
            ConnectorError::connection_failed_with_source(format!("request failed: {url}"), e)
        }
    })?;

    debug!(url = %url, status = %response.status(), "Received response");
    Ok(response)
}

/// Pass successful responses through; classify the rest.
///
/// `conflict_marker` is the text the remote uses to say the effect already
/// exists for this particular operation. A 409 is always a conflict.
pub(crate) async fn check(
    response: Response,
    conflict_marker: Option<&str>,
) -> ConnectorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let resource = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &resource, &body, conflict_marker))
}

/// Decode a JSON body.
pub(crate) async fn json<T: DeserializeOwned>(response: Response) -> ConnectorResult<T> {
    let bytes = response.bytes().await.map_err(|e| {
        ConnectorError::connection_failed_with_source("failed to read response body", e)
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ConnectorError::invalid_data(format!("unexpected response body: {e}"))
    })
}

/// Map a failed status to a connector error. `resource` is the request path.
pub(crate) fn classify(
    status: StatusCode,
    resource: &str,
    body: &str,
    conflict_marker: Option<&str>,
) -> ConnectorError {
    let message = extract_message(body);

    if status == StatusCode::CONFLICT || conflict_marker.is_some_and(|m| body.contains(m)) {
        return ConnectorError::already_exists(message);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ConnectorError::AuthenticationFailed { message }
        }
        StatusCode::NOT_FOUND => ConnectorError::ObjectNotFound {
            identifier: resource.to_string(),
        },
        _ => ConnectorError::http(status.as_u16(), message),
    }
}

/// Pull a human message out of an error body.
///
/// Accepts `{"error":{"message":..}}`, `{"error":".."}` and `{"message":..}`;
/// anything else is returned as-is.
fn extract_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    json.pointer("/error/message")
        .or_else(|| json.get("error").filter(|v| v.is_string()))
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map_or_else(|| body.trim().to_string(), ToString::to_string)
}
