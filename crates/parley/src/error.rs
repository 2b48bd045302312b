//! Error taxonomy for session coordination.

use thiserror::Error;

/// Errors surfaced by the session manager and settings manager.
///
/// Advisory variants mean the request could not proceed but nothing was
/// corrupted; an embedding UI should render them as non-fatal messages.
/// `External` wraps transient collaborator failures (configuration writes,
/// durable storage, merge tooling); the operation aborts with prior state
/// preserved.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no layout session is active")]
    NoActiveSession,

    #[error("a layout session is already open for different content")]
    SessionBusy,

    #[error("layout kind `{0}` is not registered")]
    UnknownKind(String),

    #[error("layout `{0}` is already active")]
    StaleTarget(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl SessionError {
    /// Whether this is a user-facing advisory failure rather than a
    /// transient external one.
    pub fn is_advisory(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_classification() {
        assert!(SessionError::NoActiveSession.is_advisory());
        assert!(SessionError::Cancelled.is_advisory());
        assert!(SessionError::UnknownKind("x".into()).is_advisory());
        assert!(!SessionError::External(anyhow::anyhow!("disk full")).is_advisory());
    }
}
