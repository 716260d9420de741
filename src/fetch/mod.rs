pub mod body;
pub mod client;
pub mod cursor;
pub mod fetcher;

pub use body::{BodyError, BodyLines};
pub use client::{ClientError, LogStreamClient};
pub use cursor::{Cursor, CursorError};
pub use fetcher::{body_error_outcome, FetchError, Fetcher, PageOutcome};
