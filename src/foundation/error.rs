/// Convenience result type used across the cluster server.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Top-level error taxonomy used by server APIs.
#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    /// An operation was invoked from a run state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The requested topology cannot be built from the available resources.
    #[error("topology error: {0}")]
    Topology(String),

    /// A node could not be reached or launched.
    #[error("connection error: {0}")]
    Connection(String),

    /// One or more nodes failed to change their running state.
    #[error("node error: {0}")]
    Node(String),

    /// A command arrived that the receiver cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration text or settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClusterError {
    /// Build a [`ClusterError::InvalidState`] value.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Build a [`ClusterError::Topology`] value.
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::Topology(msg.into())
    }

    /// Build a [`ClusterError::Connection`] value.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Build a [`ClusterError::Node`] value.
    pub fn node(msg: impl Into<String>) -> Self {
        Self::Node(msg.into())
    }

    /// Build a [`ClusterError::Protocol`] value.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Build a [`ClusterError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
