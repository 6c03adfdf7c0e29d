//! Blocking HTTP helper for the event feed and remote speaker images.

use crate::error::{ComposeError, ComposeResult};

pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[cfg(feature = "remote")]
pub fn fetch_bytes(url: &str) -> ComposeResult<Fetched> {
    use std::time::Duration;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| ComposeError::fetch(url, format!("failed to build runtime: {error}")))?;

    runtime.block_on(async move {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| ComposeError::fetch(url, error.to_string()))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|error| ComposeError::fetch(url, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ComposeError::fetch(url, format!("HTTP {status}")));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_owned());
        let bytes = response
            .bytes()
            .await
            .map_err(|error| ComposeError::fetch(url, format!("failed to read body: {error}")))?;
        Ok(Fetched {
            bytes: bytes.to_vec(),
            content_type,
        })
    })
}

#[cfg(not(feature = "remote"))]
pub fn fetch_bytes(url: &str) -> ComposeResult<Fetched> {
    Err(ComposeError::fetch(
        url,
        "remote fetching is disabled (built without the `remote` feature)",
    ))
}
