//! Shared HTTP plumbing for vendor adapters.
//!
//! Every adapter performs exactly one JSON `POST` per attempt. This helper
//! owns client construction (including the optional per-attempt deadline),
//! status handling and vendor error extraction, so adapters only deal with
//! their wire types.

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{AirError, Result};
use crate::traits::ProviderId;

/// Vendor error envelope. OpenAI, Mistral and Anthropic all nest the human
/// readable message under `error.message`.
#[derive(Debug, Deserialize)]
struct VendorErrorResponse {
    error: VendorErrorDetail,
}

#[derive(Debug, Deserialize)]
struct VendorErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// Build the HTTP client for one provider.
pub(crate) fn build_client(config: &ProviderConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    let mut builder = Client::builder().default_headers(headers);
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }

    builder.build().map_err(|e| {
        AirError::ConfigError(format!(
            "Failed to build HTTP client for {}: {}",
            config.provider, e
        ))
    })
}

/// Credential of an enabled provider, or a config error.
pub(crate) fn require_api_key(config: &ProviderConfig) -> Result<String> {
    config.api_key.clone().ok_or_else(|| {
        AirError::ConfigError(format!("{} has no API key configured", config.provider))
    })
}

/// Header value from a secret, without echoing the secret in the error.
pub(crate) fn secret_header(provider: ProviderId, value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| AirError::request_failed(provider, "API key is not a valid header value"))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Turn a transport error into an attempt failure.
fn transport_error(provider: ProviderId, err: reqwest::Error) -> AirError {
    let reason = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        format!("network error: {}", err)
    };
    AirError::request_failed(provider, reason)
}

/// Reason string for a non-2xx reply.
fn status_reason(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<VendorErrorResponse>(body) {
        Ok(resp) => match resp.error.error_type {
            Some(kind) => format!("HTTP {}: {}: {}", status, kind, resp.error.message),
            None => format!("HTTP {}: {}", status, resp.error.message),
        },
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    }
}

/// `POST` a JSON body and decode the JSON reply.
///
/// Non-2xx statuses, transport errors and undecodable bodies all become
/// `ProviderRequestFailed` for `provider`.
pub(crate) async fn post_json<B, R>(
    client: &Client,
    provider: ProviderId,
    url: &str,
    headers: HeaderMap,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    debug!(provider = %provider, url = %url, "Sending provider request");

    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !status.is_success() {
        let reason = status_reason(status, &text);
        warn!(provider = %provider, status = status.as_u16(), "Provider returned an error status");
        return Err(AirError::request_failed(provider, reason));
    }

    debug!(provider = %provider, bytes = text.len(), "Provider response received");

    serde_json::from_str(&text).map_err(|e| {
        AirError::request_failed(provider, format!("failed to parse response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint("http://localhost:8080", "messages"),
            "http://localhost:8080/messages"
        );
    }

    #[test]
    fn test_status_reason_parses_openai_error() {
        let body = r#"{"error": {
            "message": "Incorrect API key provided",
            "type": "invalid_request_error",
            "code": "invalid_api_key"
        }}"#;
        let reason = status_reason(reqwest::StatusCode::UNAUTHORIZED, body);
        assert_eq!(
            reason,
            "HTTP 401 Unauthorized: invalid_request_error: Incorrect API key provided"
        );
    }

    #[test]
    fn test_status_reason_parses_anthropic_error() {
        let body =
            r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        let reason = status_reason(reqwest::StatusCode::SERVICE_UNAVAILABLE, body);
        assert!(reason.contains("503"));
        assert!(reason.contains("Overloaded"));
    }

    #[test]
    fn test_status_reason_raw_body() {
        let reason = status_reason(reqwest::StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(reason, "HTTP 502 Bad Gateway: upstream down");
        let reason = status_reason(reqwest::StatusCode::BAD_GATEWAY, "");
        assert_eq!(reason, "HTTP 502 Bad Gateway");
    }

    #[test]
    fn test_require_api_key() {
        let config = ProviderConfig::new(ProviderId::OpenAI, None);
        assert!(matches!(
            require_api_key(&config),
            Err(AirError::ConfigError(_))
        ));
        let config = ProviderConfig::new(ProviderId::OpenAI, Some("sk"));
        assert_eq!(require_api_key(&config).unwrap(), "sk");
    }
}
