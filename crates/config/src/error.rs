use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Invalid { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn repository(name: &str, message: impl std::fmt::Display) -> Self {
        Self::Invalid {
            message: format!("repository '{name}': {message}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
