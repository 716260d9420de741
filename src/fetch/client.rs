use crate::config::types::TailConfig;
use reqwest::header::LINK;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Header carrying the API credential
pub const AUTH_HEADER: &str = "Fastly-Key";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("error generating request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("timed out after {0:?} waiting for response")]
    Timeout(Duration),

    #[error("unable to enable managed logging, response code: {0}")]
    ManagedLogging(u16),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// What the fetch loop should do with a response, judged on status alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// 200, read the body
    Read,
    /// Server trouble or rate limiting, wait and ask again
    Retry,
    /// 404 for an explicitly requested start time
    FromNotFound(i64),
    /// Anything else
    Unrecoverable,
}

/// Classify a response status. `from` is the start time the user asked
/// for, if any.
pub fn classify_status(status: StatusCode, from: Option<i64>) -> StatusAction {
    if status == StatusCode::OK {
        return StatusAction::Read;
    }

    if status == StatusCode::NOT_FOUND {
        if let Some(from) = from {
            return StatusAction::FromNotFound(from);
        }
    }

    if (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return StatusAction::Retry;
    }

    StatusAction::Unrecoverable
}

/// HTTP client for the managed log stream endpoint
#[derive(Debug)]
pub struct LogStreamClient {
    base_url: Url,
    token: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl LogStreamClient {
    pub fn new(config: &TailConfig) -> Result<Self> {
        let base_url = Url::parse(&config.log_stream_url())?;

        // No overall timeout: the body is a long-lived stream. Only the
        // wait for response headers is bounded, in get().
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url,
            token: config.token.clone(),
            client,
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue a GET for one page of the stream and return once headers arrive
    pub async fn get(&self, url: Url) -> Result<Response> {
        trace!(method = "GET", url = %url, "Sending request");
        self.send(self.client.get(url)).await
    }

    /// Turn on managed logging for the service. Returns false when it was
    /// already on (409 Conflict).
    pub async fn enable_managed_logging(&self) -> Result<bool> {
        trace!(method = "POST", url = %self.base_url, "Sending request");
        let response = self.send(self.client.post(self.base_url.clone())).await?;

        let status = response.status();
        drain(response).await;

        if status == StatusCode::CONFLICT {
            debug!("Managed logging already enabled");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(ClientError::ManagedLogging(status.as_u16()));
        }
        Ok(true)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.header(AUTH_HEADER, &self.token);
        let response = tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| ClientError::Timeout(self.request_timeout))??;

        trace!(
            status = response.status().as_u16(),
            link = ?response.headers().get_all(LINK).iter().collect::<Vec<_>>(),
            content_length = ?response.content_length(),
            "Received response"
        );

        Ok(response)
    }
}

/// Read and discard the rest of a response so the connection can be reused
pub async fn drain(mut response: Response) {
    while let Ok(Some(_)) = response.chunk().await {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TailConfig {
        TailConfig::new("http://localhost:7105", "svc123", "secret")
    }

    #[test]
    fn test_client_constructs_service_url() {
        let client = LogStreamClient::new(&test_config()).unwrap();
        assert_eq!(
            client.base_url().as_str(),
            "http://localhost:7105/service/svc123/log_stream/managed/instance_output"
        );
        assert_eq!(client.token, "secret");
    }

    #[test]
    fn test_client_rejects_malformed_endpoint() {
        let config = TailConfig::new("not a url", "svc123", "secret");
        assert!(matches!(
            LogStreamClient::new(&config),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_classify_ok() {
        assert_eq!(classify_status(StatusCode::OK, None), StatusAction::Read);
        assert_eq!(classify_status(StatusCode::OK, Some(1000)), StatusAction::Read);
    }

    #[test]
    fn test_classify_not_found_depends_on_from() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, Some(1000)),
            StatusAction::FromNotFound(1000)
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, None),
            StatusAction::Unrecoverable
        );
    }

    #[test]
    fn test_classify_retryable_statuses() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
        ] {
            assert_eq!(classify_status(status, Some(1)), StatusAction::Retry, "{status}");
        }
    }

    #[test]
    fn test_classify_fatal_statuses() {
        for status in [
            StatusCode::NOT_IMPLEMENTED,
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NO_CONTENT,
        ] {
            assert_eq!(classify_status(status, None), StatusAction::Unrecoverable, "{status}");
        }
    }
}
