use crate::logs::{high_sequence, Batch, Log};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// A delay the output loop must arm. When it fires, logs of `request_id`
/// with a sequence number up to and including `seq` are flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushTimer {
    pub request_id: String,
    pub seq: u64,
    pub delay: Duration,
}

/// A point at which the running maximum sequence number of a request rose
#[derive(Debug, Clone)]
struct Receive {
    when: Instant,
    high_seq: u64,
}

/// Buffered state for one in-flight request
#[derive(Debug, Default)]
struct RequestLogs {
    /// Sorted by sequence number
    logs: Vec<Log>,
    /// The head always has exactly one armed timer
    receives: VecDeque<Receive>,
}

/// Per-request reordering table.
///
/// Logs are held for `sort_buffer` after the last observed rise of their
/// request's maximum sequence number, then released in sequence order.
/// Pure state: timers are returned to the caller to arm, never run here.
pub struct ReorderBuffer {
    requests: HashMap<String, RequestLogs>,
    sort_buffer: Duration,
}

impl ReorderBuffer {
    pub fn new(sort_buffer: Duration) -> Self {
        Self {
            requests: HashMap::new(),
            sort_buffer,
        }
    }

    /// Merge a batch into the table.
    ///
    /// Returns a timer for every request that had no timer running.
    pub fn push_batch(&mut self, batch: Batch, now: Instant) -> Vec<FlushTimer> {
        let mut timers = Vec::new();

        for (request_id, logs) in batch.split_by_request() {
            let high_seq = high_sequence(&logs);
            let entry = self.requests.entry(request_id.clone()).or_default();

            // Batches aren't ordered relative to each other, so re-sort the
            // whole buffer on every merge
            entry.logs.extend(logs);
            entry.logs.sort_by_key(|l| l.sequence_num);

            let idle = entry.receives.is_empty();
            let raises_max = entry
                .receives
                .back()
                .map_or(true, |last| high_seq > last.high_seq);

            if raises_max {
                entry.receives.push_back(Receive {
                    when: now,
                    high_seq,
                });
            }

            if idle {
                timers.push(FlushTimer {
                    request_id,
                    seq: high_seq,
                    delay: self.sort_buffer,
                });
            }
        }

        timers
    }

    /// Handle the head timer of `request_id` firing for `seq`.
    ///
    /// Every queued receive that has been held for the full sort buffer by
    /// `now` is flushed along with the head. Returns the logs to print, in
    /// sequence order, and the next timer to arm for this request if it
    /// still has pending receives.
    pub fn expire(&mut self, request_id: &str, seq: u64, now: Instant) -> (Vec<Log>, Option<FlushTimer>) {
        let Some(entry) = self.requests.get_mut(request_id) else {
            return (Vec::new(), None);
        };

        entry.receives.pop_front();

        // Receives that are already due go out with this flush instead of
        // each waiting on a timer of their own
        let mut flush_seq = seq;
        while let Some(recv) = entry.receives.front() {
            if now.saturating_duration_since(recv.when) < self.sort_buffer {
                break;
            }
            flush_seq = flush_seq.max(recv.high_seq);
            entry.receives.pop_front();
        }

        let idx = entry.logs.partition_point(|l| l.sequence_num <= flush_seq);
        let remaining = entry.logs.split_off(idx);
        let flushed = std::mem::replace(&mut entry.logs, remaining);

        let next = match entry.receives.front() {
            Some(recv) => Some(FlushTimer {
                request_id: request_id.to_string(),
                seq: recv.high_seq,
                // Time already served counts against the buffer
                delay: self
                    .sort_buffer
                    .saturating_sub(now.saturating_duration_since(recv.when)),
            }),
            None if entry.logs.is_empty() => None,
            None => {
                // Leftovers with no receive covering them get a full window
                let high_seq = high_sequence(&entry.logs);
                entry.receives.push_back(Receive {
                    when: now,
                    high_seq,
                });
                Some(FlushTimer {
                    request_id: request_id.to_string(),
                    seq: high_seq,
                    delay: self.sort_buffer,
                })
            }
        };

        if next.is_none() {
            self.requests.remove(request_id);
        }

        (flushed, next)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Number of requests with buffered state
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Number of logs waiting to be flushed
    pub fn buffered_count(&self) -> usize {
        self.requests.values().map(|r| r.logs.len()).sum()
    }
}
