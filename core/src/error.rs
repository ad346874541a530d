use thiserror::Error;

/// Boxed engine error carried verbatim by [`VolumeError::Internal`].
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Volume database error types
#[derive(Error, Debug)]
pub enum VolumeError {
    /// Empty or malformed argument (volume name, configuration value)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A volume with this name already exists
    #[error("Volume already exists: {0}")]
    AlreadyExists(String),

    /// The named volume does not exist
    #[error("Volume not found: {0}")]
    NotFound(String),

    /// Operation is illegal in the volume's current reference state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend is not connected or the connection was lost
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Underlying backend failure, propagated unmodified
    #[error(transparent)]
    Internal(BackendError),
}

/// Distinguishable kind of a [`VolumeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    AlreadyExists,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid-argument",
            Self::AlreadyExists => "already-exists",
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl VolumeError {
    /// Wrap an engine error without altering its message.
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<BackendError>,
    {
        Self::Internal(err.into())
    }

    /// Error returned by every operation attempted before `connect()`.
    pub fn not_connected() -> Self {
        Self::Unavailable("database is not connected".to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for VolumeError {
    fn from(err: serde_json::Error) -> Self {
        VolumeError::InvalidArgument(format!("malformed configuration: {}", err))
    }
}

/// Result type alias for volume database operations
pub type Result<T> = std::result::Result<T, VolumeError>;
