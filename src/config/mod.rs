pub mod parse;
pub mod types;

pub use parse::{parse_duration, parse_stream, validate_config, ConfigError};
pub use types::TailConfig;
