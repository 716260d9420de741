use crate::logs::Stream;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.fastly.com";
pub const DEFAULT_SORT_BUFFER: Duration = Duration::from_secs(1);
pub const DEFAULT_SEARCH_PADDING: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a tail run needs
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// API endpoint, e.g. `https://api.fastly.com`
    pub endpoint: String,
    pub service_id: String,
    pub token: String,

    /// Start of the tail in Unix seconds, as requested (unpadded)
    pub from: Option<i64>,
    /// End of the tail in Unix seconds, as requested (unpadded)
    pub to: Option<i64>,

    /// How long logs are held per request to sort out-of-order arrivals
    pub sort_buffer: Duration,
    /// Widening applied to `from`/`to` when searching the stream
    pub search_padding: Duration,

    /// Only print this stream (None prints both)
    pub stream: Option<Stream>,
    pub timestamps: bool,

    /// Bound on connecting and waiting for response headers
    pub request_timeout: Duration,
    /// Wait before re-requesting a window after a retryable failure
    pub retry_interval: Duration,

    pub verbose: bool,
}

impl TailConfig {
    pub fn new(
        endpoint: impl Into<String>,
        service_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            service_id: service_id.into(),
            token: token.into(),
            from: None,
            to: None,
            sort_buffer: DEFAULT_SORT_BUFFER,
            search_padding: DEFAULT_SEARCH_PADDING,
            stream: None,
            timestamps: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            verbose: false,
        }
    }

    /// Full URL of the managed log stream for the service
    pub fn log_stream_url(&self) -> String {
        format!(
            "{}/service/{}/log_stream/managed/instance_output",
            self.endpoint.trim_end_matches('/'),
            self.service_id
        )
    }

    fn padding_secs(&self) -> i64 {
        self.search_padding.as_secs() as i64
    }

    /// `from` moved back by the search padding
    pub fn padded_from(&self) -> Option<i64> {
        self.from.map(|from| from - self.padding_secs())
    }

    /// `to` moved forward by the search padding
    pub fn padded_to(&self) -> Option<i64> {
        self.to.map(|to| to + self.padding_secs())
    }
}
