use crate::logs::{Log, Stream};
use std::io::{self, Write};
use tracing::warn;

/// Renders flushed logs to the output sink.
///
/// Each line is `{stream:>6} | {request_id:>8.8} | {message}`, optionally
/// prefixed with the request start time in RFC3339 UTC and ` | `.
pub struct Printer<W> {
    out: W,
    /// Only print this stream, or both when None
    stream: Option<Stream>,
    timestamps: bool,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, stream: Option<Stream>, timestamps: bool) -> Self {
        Self {
            out,
            stream,
            timestamps,
        }
    }

    /// Print the logs that pass the stream filter, in the order given.
    ///
    /// Write failures are logged, not returned: a broken output sink must
    /// not take the output loop down with it.
    pub fn print(&mut self, logs: &[Log]) {
        if logs.is_empty() {
            return;
        }

        let stream = self.stream;
        let timestamps = self.timestamps;
        let out = &mut self.out;

        let result = logs
            .iter()
            .filter(|l| passes(stream, l))
            .try_for_each(|l| write_line(out, l, timestamps))
            .and_then(|_| out.flush());

        if let Err(e) = result {
            warn!(error = %e, "Failed to write logs");
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn passes(filter: Option<Stream>, log: &Log) -> bool {
    filter.map_or(true, |s| s == log.stream)
}

fn write_line<W: Write>(out: &mut W, log: &Log, timestamps: bool) -> io::Result<()> {
    if timestamps {
        write!(out, "{} | ", log.request_start_rfc3339())?;
    }
    writeln!(out, "{}", log)
}
