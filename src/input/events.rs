use crate::core::{geo::Point, viewport::Viewport};
use crate::data::store::PointId;
use serde::{Deserialize, Serialize};

/// Identifier the map engine hands out for one bound listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Event channels the map engine can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// Intermediate pan/zoom frame
    ViewportChanging,
    /// Pan/zoom gesture has stabilized
    ViewportSettled,
    PointerMove,
    PointerDown,
    PointerUp,
    /// A marker was clicked or tapped
    MarkerActivated,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::ViewportChanging => write!(f, "viewportchanging"),
            EventKind::ViewportSettled => write!(f, "viewportsettled"),
            EventKind::PointerMove => write!(f, "pointermove"),
            EventKind::PointerDown => write!(f, "pointerdown"),
            EventKind::PointerUp => write!(f, "pointerup"),
            EventKind::MarkerActivated => write!(f, "markeractivated"),
        }
    }
}

/// Events the host forwards from the map engine
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    ViewportChanging { viewport: Viewport },
    ViewportSettled { viewport: Viewport },
    PointerMove { position: Point },
    PointerDown { position: Point },
    PointerUp { position: Point },
    MarkerActivated { point_id: PointId },
}

impl MapEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MapEvent::ViewportChanging { .. } => EventKind::ViewportChanging,
            MapEvent::ViewportSettled { .. } => EventKind::ViewportSettled,
            MapEvent::PointerMove { .. } => EventKind::PointerMove,
            MapEvent::PointerDown { .. } => EventKind::PointerDown,
            MapEvent::PointerUp { .. } => EventKind::PointerUp,
            MapEvent::MarkerActivated { .. } => EventKind::MarkerActivated,
        }
    }

    /// Gets the screen position associated with this event, if any
    pub fn position(&self) -> Option<Point> {
        match self {
            MapEvent::PointerMove { position }
            | MapEvent::PointerDown { position }
            | MapEvent::PointerUp { position } => Some(*position),
            _ => None,
        }
    }

    /// Checks if this is a pointer event
    pub fn is_pointer_event(&self) -> bool {
        self.position().is_some()
    }
}

/// Work a handler asks the engine to do once dispatch has finished.
///
/// Handlers never touch engine state directly; they translate events into
/// commands, and the engine applies them after the registry is done
/// iterating.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    ViewportChanging,
    Settle(Viewport),
    UpdateSelection(Point),
    ActivateMarker(PointId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_and_position() {
        let moved = MapEvent::PointerMove {
            position: Point::new(100.0, 200.0),
        };
        assert_eq!(moved.kind(), EventKind::PointerMove);
        assert_eq!(moved.position(), Some(Point::new(100.0, 200.0)));
        assert!(moved.is_pointer_event());

        let settled = MapEvent::ViewportSettled {
            viewport: Viewport::default(),
        };
        assert_eq!(settled.kind(), EventKind::ViewportSettled);
        assert_eq!(settled.position(), None);
        assert!(!settled.is_pointer_event());
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::MarkerActivated.to_string(), "markeractivated");
        assert_eq!(EventKind::ViewportSettled.to_string(), "viewportsettled");
    }
}
