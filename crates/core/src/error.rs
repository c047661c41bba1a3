//! Error types for s3k-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for s3k-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for s3k-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration or argument error, raised before any I/O
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid root locator
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Enumerating a root failed part-way
    #[error("Failed to list {root}: {source}")]
    Listing {
        root: String,
        #[source]
        source: Box<Error>,
    },

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap an error raised while enumerating `root`
    pub fn listing(root: impl Into<String>, source: Error) -> Self {
        Error::Listing {
            root: root.into(),
            source: Box::new(source),
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) => 2,   // UsageError
            Error::Config(_) => 2,        // UsageError
            Error::Network(_) => 3,       // NetworkError
            Error::Auth(_) => 4,          // AuthError
            Error::NotFound(_) => 5,      // NotFound
            Error::Conflict(_) => 6,      // Conflict
            Error::Listing { source, .. } => source.exit_code(),
            _ => 1,                       // GeneralError
        }
    }

    /// Whether this error means the addressed object or container does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Error::Listing { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
