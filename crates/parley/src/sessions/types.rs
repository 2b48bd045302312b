//! Domain types for layout sessions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one layout session instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a new unique session ID.
    pub fn generate() -> Self {
        Self(format!("layout-{}", Uuid::new_v4().as_simple()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content location shown in one pane, in URI string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentUri(pub String);

impl ContentUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ordered tuple of content sources a session presents.
///
/// `merged` is absent for plain diff pairs. `backup` points at the safety
/// copy of the merged file and never participates in content identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffedUris {
    pub base: ContentUri,
    pub local: ContentUri,
    pub remote: ContentUri,
    pub merged: Option<ContentUri>,
    pub backup: Option<ContentUri>,
}

impl DiffedUris {
    pub fn new(
        base: ContentUri,
        local: ContentUri,
        remote: ContentUri,
        merged: Option<ContentUri>,
    ) -> Self {
        Self {
            base,
            local,
            remote,
            merged,
            backup: None,
        }
    }

    pub fn with_backup(mut self, backup: ContentUri) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Whether both tuples present the same content, ignoring the backup
    /// source identity.
    pub fn same_content(&self, other: &DiffedUris) -> bool {
        self.base == other.base
            && self.local == other.local
            && self.remote == other.remote
            && self.merged == other.merged
    }
}

impl std::fmt::Display for DiffedUris {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.merged {
            Some(merged) => write!(f, "{} <- {} | {} -> {}", self.base, self.local, self.remote, merged),
            None => write!(f, "{} <- {} | {}", self.base, self.local, self.remote),
        }
    }
}

/// Where a session sits in its lifecycle.
///
/// Driven by the session itself; the manager only ever sees sessions it
/// constructed and transitions them while holding its Monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Constructed, activation not yet started.
    Created,
    /// Pane and view setup in progress.
    Activating,
    Active,
    Deactivating,
}

/// Direction for stepping focus through merge conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDirection {
    Next,
    Previous,
}

/// Sent by a session exactly once when its deactivation completes.
#[derive(Debug, Clone)]
pub struct DeactivationNotice {
    pub session: SessionId,
    /// True when the manager itself asked for the deactivation (explicit
    /// close, or the old half of a switch); false when the session ended
    /// externally, e.g. the user closed its views.
    pub by_manager: bool,
}

/// Lifecycle events, fired exactly once per completed activation or
/// deactivation, always outside the critical section that produced them.
#[derive(Debug, Clone)]
pub enum LayoutEvent {
    Activated {
        session: SessionId,
        kind: String,
        uris: DiffedUris,
    },
    Deactivated {
        session: SessionId,
        kind: String,
        uris: DiffedUris,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uris(merged: Option<&str>, backup: Option<&str>) -> DiffedUris {
        let mut built = DiffedUris::new(
            ContentUri::new("file:///base"),
            ContentUri::new("file:///local"),
            ContentUri::new("file:///remote"),
            merged.map(ContentUri::new),
        );
        if let Some(backup) = backup {
            built = built.with_backup(ContentUri::new(backup));
        }
        built
    }

    #[test]
    fn test_same_content_ignores_backup() {
        let a = uris(Some("file:///merged"), Some("file:///backup-1"));
        let b = uris(Some("file:///merged"), Some("file:///backup-2"));
        let c = uris(Some("file:///merged"), None);

        assert!(a.same_content(&b));
        assert!(a.same_content(&c));
    }

    #[test]
    fn test_same_content_compares_all_four_sources() {
        let a = uris(Some("file:///merged"), None);
        let mut b = a.clone();
        b.merged = Some(ContentUri::new("file:///other"));
        assert!(!a.same_content(&b));

        let mut c = a.clone();
        c.remote = ContentUri::new("file:///elsewhere");
        assert!(!a.same_content(&c));
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
