// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request plumbing shared by the provider clients.

use std::time::Duration;

use reqwest::Url;
use reqwest::header::HeaderMap;
use serde_json::Value;
use switchboard_core::SwitchboardError;
use tracing::debug;

pub(crate) fn build_client(
    timeout: Duration,
    headers: HeaderMap,
) -> Result<reqwest::Client, SwitchboardError> {
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| SwitchboardError::Provider {
            message: format!("failed to build HTTP client: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, SwitchboardError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| SwitchboardError::Config(format!("base URL `{base}` cannot have a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn parse_base(raw: &str) -> Result<Url, SwitchboardError> {
    Url::parse(raw).map_err(|e| SwitchboardError::Config(format!("invalid base URL `{raw}`: {e}")))
}

/// Sends a request, mapping transport failures to provider errors.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    upstream: &str,
) -> Result<reqwest::Response, SwitchboardError> {
    let response = request.send().await.map_err(|e| SwitchboardError::Provider {
        message: format!("{upstream} request failed: {e}"),
        status: None,
        source: Some(Box::new(e)),
    })?;
    debug!(upstream, status = %response.status(), "response received");
    Ok(response)
}

/// Fails with the status and body text unless the response is 2xx.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    upstream: &str,
) -> Result<reqwest::Response, SwitchboardError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SwitchboardError::Provider {
        message: format!("{upstream} returned {}: {body}", status.as_u16()),
        status: Some(status.as_u16()),
        source: None,
    })
}

/// Reads a 2xx JSON body. An empty body reads as `null`.
pub(crate) async fn read_json(
    response: reqwest::Response,
    upstream: &str,
) -> Result<Value, SwitchboardError> {
    let response = ensure_success(response, upstream).await?;
    let status = response.status().as_u16();
    let bytes = response.bytes().await.map_err(|e| SwitchboardError::Provider {
        message: format!("{upstream} body read failed: {e}"),
        status: Some(status),
        source: Some(Box::new(e)),
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| SwitchboardError::Provider {
        message: format!("{upstream} returned malformed JSON: {e}"),
        status: Some(status),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_segments_and_drops_trailing_slash() {
        let base = parse_base("https://chat.example.com/api/v1/").expect("base");
        let url = endpoint(&base, &["pages", "p 1", "conversations"]).expect("url");
        assert_eq!(
            url.as_str(),
            "https://chat.example.com/api/v1/pages/p%201/conversations"
        );
    }

    #[test]
    fn parse_base_rejects_garbage() {
        assert!(matches!(
            parse_base("not a url"),
            Err(SwitchboardError::Config(_))
        ));
    }
}
