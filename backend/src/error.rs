use crate::types::ServiceLabel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Network, DNS or timeout failure; timeouts are not told apart
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream responded {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Required dependency '{label}' failed: {source}")]
    BlockingDependency {
        label: ServiceLabel,
        #[source]
        source: Box<ConsoleError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ConsoleError {
    pub fn blocking(label: ServiceLabel, source: ConsoleError) -> Self {
        ConsoleError::BlockingDependency {
            label,
            source: Box::new(source),
        }
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ConsoleError::Decode(e.to_string())
        } else {
            ConsoleError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
