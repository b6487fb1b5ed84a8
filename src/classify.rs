use tracing::info;

use crate::model::error::{ConnectorError, ServiceError, CONTAINER_ALREADY_EXISTS};

/// Turns a service failure into the connector's error type.
///
/// A container that already exists becomes [`ConnectorError::ContainerConflict`].
/// Everything else is wrapped as [`ConnectorError::Transport`], tagged with the
/// operation that failed. Both are logged at info level.
pub fn classify(err: ServiceError, operation: &'static str, container: &str) -> ConnectorError {
    if is_container_conflict(&err) {
        info!(container = container, operation = operation, "container already exists");
        return ConnectorError::ContainerConflict {
            container: container.to_string(),
        };
    }

    info!(error_message=%err, error_group=operation, container=container);
    ConnectorError::Transport {
        operation,
        source: err,
    }
}

pub fn is_container_conflict(err: &ServiceError) -> bool {
    err.code() == Some(CONTAINER_ALREADY_EXISTS)
}
