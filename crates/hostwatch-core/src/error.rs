//! Error types for configuration and host list loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading the hosts file or the daemon config.
///
/// All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't open hosts file {}: {source}", path.display())]
    HostsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid duration for `{field}`: {value:?}")]
    Duration { field: &'static str, value: String },

    #[error("invalid notify command: {0}")]
    Command(String),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
