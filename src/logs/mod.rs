pub mod batch;

pub use batch::{high_sequence, Batch, Log, Stream};
