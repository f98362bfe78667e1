use std::path::{Path, PathBuf};

/// Shorthand for results carrying an [Error]
pub type Result<T> = std::result::Result<T, Error>;

/// All potential errors in hue-restore
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Used when failing to dump json
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Used when failing to load json
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// Network or timeout error talking to the bridge
    #[error("bridge transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bridge answered with a structured error
    #[error("bridge error {kind} at {address}: {description}")]
    Bridge {
        kind: u32,
        address: String,
        description: String,
    },

    /// The bridge answered with something we can't interpret
    #[error("unexpected bridge response: {0}")]
    UnexpectedResponse(String),

    /// A light was enumerated without its `uniqueid`
    #[error("light at index {0} has no unique id")]
    MissingUniqueId(String),

    /// Failed to open, read or write something in the storage directory
    #[error("storage {action} error on {path:?}: {err:?}")]
    Storage {
        action: String,
        path: PathBuf,
        err: std::io::Error,
    },

    /// A configuration value is outside of its valid range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration value required by this command is not set
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// Looking up a light the store has never recorded
    #[error("light not found: {0}")]
    LightNotFound(String),
}

impl Error {
    /// Create a new storage error
    pub fn storage(action: &str, path: &Path, err: std::io::Error) -> Self {
        Error::Storage {
            action: action.to_string(),
            path: path.to_path_buf(),
            err,
        }
    }

    /// Create a new bridge application error
    pub fn bridge(kind: u32, address: &str, description: &str) -> Self {
        Error::Bridge {
            kind,
            address: address.to_string(),
            description: description.to_string(),
        }
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
