use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Output stream a workload wrote a message to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
    /// Any stream name the endpoint sends that we don't know about
    #[serde(other)]
    Unknown,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
            Stream::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so width/alignment flags apply
        f.pad(self.as_str())
    }
}

/// A single log line emitted by a running workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Per-request sequence number used to reorder messages
    #[serde(rename = "sequence_number")]
    pub sequence_num: u64,

    /// Time the originating request was received, in microseconds since epoch
    #[serde(rename = "request_start_us")]
    pub request_start: i64,

    pub stream: Stream,

    /// UUID of the originating request
    #[serde(rename = "id")]
    pub request_id: String,

    pub message: String,
}

impl Log {
    /// Request start time as a UTC timestamp.
    ///
    /// Returns None if the microsecond value is out of chrono's range.
    pub fn request_start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.request_start)
    }

    /// RFC3339 rendering of the request start, e.g. `2023-11-14T22:13:20Z`
    pub fn request_start_rfc3339(&self) -> String {
        self.request_start_time()
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    }
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Request IDs are long UUIDs, only the first 8 chars are shown
        write!(
            f,
            "{:>6} | {:>8.8} | {}",
            self.stream, self.request_id, self.message
        )
    }
}

/// One unit of transfer from the log stream endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch ID, used to resume a window after a failed read
    #[serde(rename = "batch_id", default)]
    pub id: String,

    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Batch {
    /// Decode one line of the response body.
    ///
    /// An empty (or whitespace only) line is an empty batch, anything else
    /// must be a single JSON object.
    pub fn decode(line: &[u8]) -> Result<Batch, serde_json::Error> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(Batch::default());
        }
        serde_json::from_slice(line)
    }

    /// Group the logs of this batch by request ID, preserving batch order
    /// within each group.
    pub fn split_by_request(self) -> HashMap<String, Vec<Log>> {
        let mut out: HashMap<String, Vec<Log>> = HashMap::new();
        for log in self.logs {
            out.entry(log.request_id.clone()).or_default().push(log);
        }
        out
    }
}

/// Highest sequence number in a slice of logs (0 when empty).
pub fn high_sequence(logs: &[Log]) -> u64 {
    logs.iter().map(|l| l.sequence_num).max().unwrap_or(0)
}
