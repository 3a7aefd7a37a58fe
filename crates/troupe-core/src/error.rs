// Error types shared across the control plane

use thiserror::Error;

/// Result type alias for control-plane operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the control plane
#[derive(Debug, Error)]
pub enum Error {
    /// A resource with the same key already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The requested resource was not found
    #[error("{0} not found")]
    NotFound(String),

    /// The agent is reachable but not accepting traffic yet
    #[error("agent '{0}' is not ready")]
    NotReady(String),

    /// An event could not be parsed or applied
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A resource failed validation
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// Stored data could not be deserialized
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A listener signalled that its consumer went away
    #[error("listener disconnected")]
    ListenerDisconnected,

    /// Component setup failed
    #[error("setup error: {0}")]
    Setup(String),

    /// Component teardown failed
    #[error("teardown error: {0}")]
    Teardown(String),

    /// A webhook payload was missing required fields
    #[error("malformed webhook payload: {0}")]
    WebhookMalformed(String),

    /// Unexpected error
    #[error(transparent)]
    Generic(#[from] anyhow::Error),
}

impl Error {
    pub fn already_exists(what: impl Into<String>) -> Self {
        Error::AlreadyExists(what.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn not_ready(agent: impl Into<String>) -> Self {
        Error::NotReady(agent.into())
    }

    pub fn invalid_event(msg: impl Into<String>) -> Self {
        Error::InvalidEvent(msg.into())
    }

    pub fn invalid_resource(msg: impl Into<String>) -> Self {
        Error::InvalidResource(msg.into())
    }

    pub fn deserialization(msg: impl Into<String>) -> Self {
        Error::Deserialization(msg.into())
    }

    pub fn setup(msg: impl Into<String>) -> Self {
        Error::Setup(msg.into())
    }

    pub fn teardown(msg: impl Into<String>) -> Self {
        Error::Teardown(msg.into())
    }

    pub fn webhook(msg: impl Into<String>) -> Self {
        Error::WebhookMalformed(msg.into())
    }

    /// Whether this error means "the key was taken" during an optimistic create
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
