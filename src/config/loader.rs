//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::NavigationConfig;
use crate::config::validation::{validate_config, ValidationError};

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Error type for configuration loading and route-table building.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    /// A route names a guard or resolver the injector does not provide.
    #[error("unknown {kind} token '{token}' on route '{path}'")]
    UnknownToken {
        kind: &'static str,
        token: String,
        path: String,
    },

    #[error("route entry without a path (component '{component}')")]
    MissingPath { component: String },
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<NavigationConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<NavigationConfig, ConfigError> {
    let config: NavigationConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[routes]]\npath = \"a\"\ncomponent = \"A\"").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.routes.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = parse_config("[router]\nmax_redirects = 0\n[observability]\nlog_level = \"loud\"").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
