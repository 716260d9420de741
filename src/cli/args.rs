use crate::config::parse::{normalize_bound, parse_duration, parse_stream, validate_config};
use crate::config::types::{TailConfig, DEFAULT_ENDPOINT};
use crate::config::ConfigError;
use crate::logs::Stream;
use clap::Args;
use std::time::Duration;

/// Flags of the tail command
#[derive(Debug, Clone, Args)]
pub struct TailArgs {
    /// Service ID to tail
    #[arg(long, short = 's', env = "FASTLY_SERVICE_ID")]
    pub service_id: String,

    /// API token
    #[arg(long, env = "FASTLY_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// API endpoint
    #[arg(long, env = "FASTLY_API_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// From time, in Unix seconds
    #[arg(long)]
    pub from: Option<i64>,

    /// To time, in Unix seconds
    #[arg(long)]
    pub to: Option<i64>,

    /// Duration of sort buffer for received logs
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub sort_buffer: Duration,

    /// Time beyond from/to to consider in searches
    #[arg(long, default_value = "2s", value_parser = parse_duration)]
    pub search_padding: Duration,

    /// Output: stdout, stderr, both (default)
    // Fully qualified so clap treats the parsed value, not the flag, as optional
    #[arg(long, value_parser = parse_stream, default_value = "both")]
    pub stream: std::option::Option<Stream>,

    /// Print timestamps with logs
    #[arg(long)]
    pub timestamps: bool,

    /// Print the resolved service before tailing
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl TailArgs {
    pub fn into_config(self) -> Result<TailConfig, ConfigError> {
        let mut config = TailConfig::new(self.endpoint, self.service_id, self.token);
        config.from = normalize_bound(self.from);
        config.to = normalize_bound(self.to);
        config.sort_buffer = self.sort_buffer;
        config.search_padding = self.search_padding;
        config.stream = self.stream;
        config.timestamps = self.timestamps;
        config.verbose = self.verbose;

        validate_config(&config)?;
        Ok(config)
    }
}
