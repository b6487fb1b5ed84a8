use thiserror::Error;

/// Service code the blob service reports when creating a container that is
/// already there.
pub const CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";

/// A failure reported by a [`crate::adapters::BlobService`] implementation.
///
/// Adapters only ever return this type. It becomes a [`ConnectorError`] in
/// [`crate::classify::classify`] and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service returned status {status} ({}): {message}", .code.as_deref().unwrap_or("no code"))]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("request failed: {message}")]
    Transport { message: String },
}

impl ServiceError {
    pub fn status(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        ServiceError::Status {
            status,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ServiceError::Transport {
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ServiceError::Status { code, .. } => code.as_deref(),
            ServiceError::Transport { .. } => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            ServiceError::Transport { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("container `{container}` already exists")]
    ContainerConflict { container: String },

    #[error("local file `{path}`: {source}")]
    LocalIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("unsupported method `{0}`, expected `upload` or `list`")]
    UnsupportedMethod(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

impl ConnectorError {
    pub fn local_io(path: &str, source: std::io::Error) -> Self {
        ConnectorError::LocalIo {
            path: path.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;
