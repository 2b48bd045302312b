//! Pane zoom level, shared between the manager and layout sessions.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Editor zoom level applied to a layout's panes. Zero is the host default;
/// negative values zoom out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zoom(pub f64);

impl Zoom {
    pub fn level(self) -> f64 {
        self.0
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Zoom(0.0)
    }
}

/// Remembers the zoom level across sessions so a new layout opens at the
/// level the user last chose.
pub trait ZoomManager: Send + Sync {
    fn current(&self) -> Zoom;
    fn remember(&self, zoom: Zoom);
}

/// In-process zoom memory.
pub struct SharedZoom {
    value: RwLock<Zoom>,
}

impl SharedZoom {
    pub fn new(initial: Zoom) -> Self {
        Self {
            value: RwLock::new(initial),
        }
    }
}

impl Default for SharedZoom {
    fn default() -> Self {
        Self::new(Zoom::default())
    }
}

impl ZoomManager for SharedZoom {
    fn current(&self) -> Zoom {
        *self.value.read().unwrap()
    }

    fn remember(&self, zoom: Zoom) {
        *self.value.write().unwrap() = zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remember_then_current() {
        let zoom = SharedZoom::default();
        assert_eq!(zoom.current(), Zoom(0.0));

        zoom.remember(Zoom(-1.5));
        assert_eq!(zoom.current(), Zoom(-1.5));
    }
}
