use reqwest::Response;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Largest single line accepted from the stream (10 MiB)
pub const MAX_LINE_SIZE: usize = 10 << 20;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("error reading response body: {0}")]
    Read(#[from] reqwest::Error),

    #[error("line exceeds maximum size of {0} bytes")]
    LineTooLong(usize),
}

impl BodyError {
    /// The connection dropped mid-body. Expected on a streaming endpoint.
    pub fn is_unexpected_eof(&self) -> bool {
        match self {
            BodyError::Read(e) => is_unexpected_eof(e),
            BodyError::LineTooLong(_) => false,
        }
    }
}

fn is_unexpected_eof(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::UnexpectedEof {
                return true;
            }
        }
        source = e.source();
    }
    false
}

/// Splits a streaming response body into newline-terminated lines.
///
/// A trailing `\r` is stripped. A final line without a newline is still
/// returned once the body ends. Lines longer than `max_line` (not counting
/// the newline) are an error.
pub struct BodyLines {
    response: Response,
    buf: Vec<u8>,
    /// Start of the unread part of `buf`
    pos: usize,
    /// Bytes after `pos` already known to contain no newline
    searched: usize,
    max_line: usize,
    eof: bool,
}

impl BodyLines {
    pub fn new(response: Response, max_line: usize) -> Self {
        Self {
            response,
            buf: Vec::new(),
            pos: 0,
            searched: 0,
            max_line,
            eof: false,
        }
    }

    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>, BodyError> {
        loop {
            let start = self.pos + self.searched;
            if let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
                let len = self.searched + offset;
                if len > self.max_line {
                    return Err(BodyError::LineTooLong(self.max_line));
                }
                let line = self.take_line(len);
                // Skip the newline
                self.pos += 1;
                return Ok(Some(line));
            }
            self.searched = self.buf.len() - self.pos;

            if self.searched > self.max_line {
                return Err(BodyError::LineTooLong(self.max_line));
            }

            if self.eof {
                if self.searched == 0 {
                    return Ok(None);
                }
                return Ok(Some(self.take_line(self.searched)));
            }

            // Compact once per chunk rather than once per line
            self.buf.drain(..self.pos);
            self.pos = 0;

            match self.response.chunk().await? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => self.eof = true,
            }
        }
    }

    fn take_line(&mut self, len: usize) -> Vec<u8> {
        let mut line = self.buf[self.pos..self.pos + len].to_vec();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        self.pos += len;
        self.searched = 0;
        line
    }
}
