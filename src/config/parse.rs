use super::types::TailConfig;
use crate::logs::Stream;
use humantime_serde::re::humantime;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid duration '{input}': {source}")]
    Duration {
        input: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("invalid stream '{0}', expected 'stdout' or 'stderr'")]
    Stream(String),

    #[error("invalid endpoint '{endpoint}': {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),
}

/// Parse a human readable duration such as `1s`, `500ms` or `2m`
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(input.trim()).map_err(|source| ConfigError::Duration {
        input: input.to_string(),
        source,
    })
}

/// Parse a `--stream` value. `both` (or empty) means no filter.
pub fn parse_stream(input: &str) -> Result<Option<Stream>, ConfigError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "both" => Ok(None),
        "stdout" => Ok(Some(Stream::Stdout)),
        "stderr" => Ok(Some(Stream::Stderr)),
        _ => Err(ConfigError::Stream(input.to_string())),
    }
}

/// A zero time bound means "unset"
pub fn normalize_bound(bound: Option<i64>) -> Option<i64> {
    bound.filter(|b| *b != 0)
}

/// Check a config before starting a run. Collects every problem instead of
/// stopping at the first.
pub fn validate_config(config: &TailConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if let Err(source) = url::Url::parse(&config.endpoint) {
        return Err(ConfigError::Endpoint {
            endpoint: config.endpoint.clone(),
            source,
        });
    }

    if config.service_id.trim().is_empty() {
        errors.push("service ID is required".to_string());
    }

    if config.token.trim().is_empty() {
        errors.push("API token is required".to_string());
    }

    if let (Some(from), Some(to)) = (config.from, config.to) {
        if from > to {
            errors.push(format!("'from' ({}) is after 'to' ({})", from, to));
        }
    }

    if let Some(from) = config.from {
        if from < 0 {
            errors.push(format!("'from' ({}) must not be negative", from));
        }
    }

    if let Some(to) = config.to {
        if to < 0 {
            errors.push(format!("'to' ({}) must not be negative", to));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> TailConfig {
        TailConfig::new("https://api.fastly.com", "svc", "token")
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(matches!(
            parse_duration("soon"),
            Err(ConfigError::Duration { .. })
        ));
    }

    #[test]
    fn test_parse_stream() {
        assert_eq!(parse_stream("stdout").unwrap(), Some(Stream::Stdout));
        assert_eq!(parse_stream("STDERR").unwrap(), Some(Stream::Stderr));
        assert_eq!(parse_stream("both").unwrap(), None);
        assert_eq!(parse_stream("").unwrap(), None);
        assert!(matches!(parse_stream("stdlog"), Err(ConfigError::Stream(_))));
    }

    #[test]
    fn test_normalize_bound() {
        assert_eq!(normalize_bound(Some(0)), None);
        assert_eq!(normalize_bound(Some(12)), Some(12));
        assert_eq!(normalize_bound(None), None);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = valid_config();
        config.token = String::new();
        config.from = Some(2000);
        config.to = Some(1000);

        match validate_config(&config) {
            Err(ConfigError::ValidationList(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("token"));
                assert!(errors[1].contains("after"));
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = valid_config();
        config.endpoint = "api.fastly.com".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Endpoint { .. })
        ));
    }
}
