use crate::config::types::TailConfig;
use crate::fetch::body::{BodyError, BodyLines, MAX_LINE_SIZE};
use crate::fetch::client::{classify_status, drain, ClientError, LogStreamClient, StatusAction};
use crate::fetch::cursor::{parse_link_header, window_from_link, Cursor, CursorError};
use crate::logs::Batch;
use crate::pipeline::channel::FetchWiring;
use crate::pipeline::Sender;
use reqwest::header::LINK;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unable to execute request: {0}")]
    Request(#[from] ClientError),

    #[error("specified 'from' time {0} not found, either too far in the past or future")]
    FromNotFound(i64),

    #[error("unrecoverable error, response code: {0}")]
    Unrecoverable(u16),

    #[error(transparent)]
    Pagination(#[from] CursorError),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Result of one request against the stream endpoint.
///
/// The loop only ever moves the cursor on `Advance`; every other outcome
/// re-requests the same window (and last delivered batch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Body read to the end, continue from the next link's window
    Advance(i64),
    /// Ask for the same window again after the retry interval
    RetryAfterDelay,
    /// Ask for the same window again right away
    Resume,
    /// Die signal fired or the output loop went away
    Cancelled,
}

/// Pulls batches from the log stream endpoint and hands them to the
/// output loop until the `to` bound is passed, a fatal error occurs, or the
/// die signal fires.
pub struct Fetcher {
    client: LogStreamClient,
    cursor: Cursor,
    /// User-requested start, before padding (for error reporting)
    requested_from: Option<i64>,
    to_window: Option<i64>,
    retry_interval: Duration,
    batch_tx: Sender<Batch>,
    die: CancellationToken,
}

impl Fetcher {
    pub fn new(client: LogStreamClient, config: &TailConfig, wiring: FetchWiring) -> Self {
        Self {
            client,
            cursor: Cursor::new(config.padded_from()),
            requested_from: config.from,
            to_window: config.padded_to(),
            retry_interval: config.retry_interval,
            batch_tx: wiring.batch_tx,
            die: wiring.die,
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Run the fetch loop. Returns Ok on natural completion or
    /// cancellation; the batch sender is dropped either way, which tells the
    /// output loop no more batches are coming.
    pub async fn run(mut self) -> Result<()> {
        let die = self.die.clone();

        loop {
            if self.cursor.is_past(self.to_window) {
                info!(
                    window = ?self.cursor.window(),
                    to = ?self.to_window,
                    "Reached window which is newer than the requested 'to'"
                );
                return Ok(());
            }

            let outcome = tokio::select! {
                biased;
                _ = die.cancelled() => PageOutcome::Cancelled,
                outcome = self.fetch_page() => outcome?,
            };

            match outcome {
                PageOutcome::Advance(window) => {
                    debug!(window = window, "Advancing to next window");
                    self.cursor.advance(window);
                }
                PageOutcome::Resume => {
                    trace!(
                        window = ?self.cursor.window(),
                        batch_id = ?self.cursor.last_batch_id(),
                        "Resuming window"
                    );
                }
                PageOutcome::RetryAfterDelay => {
                    tokio::select! {
                        biased;
                        _ = die.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(self.retry_interval) => {}
                    }
                }
                PageOutcome::Cancelled => {
                    debug!("Fetch loop cancelled");
                    return Ok(());
                }
            }
        }
    }

    /// Request the current window and forward every batch in the body.
    async fn fetch_page(&mut self) -> Result<PageOutcome> {
        let url = self.cursor.request_url(self.client.base_url());
        debug!(url = %url, "Requesting log window");

        let response = match self.client.get(url.clone()).await {
            Ok(response) => response,
            Err(ClientError::Timeout(timeout)) => {
                warn!(timeout = ?timeout, "Timed out waiting for response, retrying");
                return Ok(PageOutcome::RetryAfterDelay);
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        match classify_status(status, self.requested_from) {
            StatusAction::Read => {}
            StatusAction::FromNotFound(from) => return Err(FetchError::FromNotFound(from)),
            action => {
                // 503s are routine for this endpoint, keep them quiet
                if status != StatusCode::SERVICE_UNAVAILABLE {
                    warn!(status = status.as_u16(), "non-200 resp");
                }
                drain(response).await;
                if action == StatusAction::Retry {
                    return Ok(PageOutcome::RetryAfterDelay);
                }
                return Err(FetchError::Unrecoverable(status.as_u16()));
            }
        }

        let links = parse_link_header(
            response
                .headers()
                .get_all(LINK)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        let mut lines = BodyLines::new(response, MAX_LINE_SIZE);
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Ok(body_error_outcome(&e)),
            };

            let batch = match Batch::decode(&line) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "unable to parse response body");
                    return Ok(PageOutcome::RetryAfterDelay);
                }
            };

            // Only batches with an ID carry logs worth resuming from
            if batch.id.is_empty() {
                continue;
            }

            let batch_id = batch.id.clone();
            trace!(batch_id = %batch_id, logs = batch.logs.len(), "Received batch");
            if self.batch_tx.send(batch).await.is_err() {
                return Ok(PageOutcome::Cancelled);
            }
            self.cursor.record_batch(&batch_id);
        }

        let next = links.next.ok_or(CursorError::MissingNextLink)?;
        let window = window_from_link(&next, &url)?;
        Ok(PageOutcome::Advance(window))
    }
}

/// A connection cut mid-body is routine on a streaming endpoint and is
/// resumed right away; anything else waits out the retry interval.
pub fn body_error_outcome(err: &BodyError) -> PageOutcome {
    if err.is_unexpected_eof() {
        debug!(error = %err, "Stream ended early, resuming from last batch");
        PageOutcome::Resume
    } else {
        warn!(error = %err, "error scanning response body");
        PageOutcome::RetryAfterDelay
    }
}
