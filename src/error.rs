use thiserror::Error;

/// Failures that stop the service from starting or keep it from serving.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set up the Mimir client: {0}")]
    Metrics(#[from] crate::mimir::client::PushError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
