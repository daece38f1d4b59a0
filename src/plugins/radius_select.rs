use crate::{
    core::{
        config::SelectionConfig,
        geo::{LatLngBounds, Point},
        viewport::Viewport,
    },
    data::store::{GeoPoint, PointId},
    input::{
        events::{EngineCommand, EventKind, MapEvent},
        registry::{ScopeKey, SubscriptionRegistry, SubscriptionToken},
    },
    prelude::BTreeSet,
    spatial::index::PointIndex,
    traits::MapEngine,
};

/// Result of the latest pointer move while the tool is active
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState {
    /// Pointer position in container pixels
    pub center: Point,
    pub radius_px: f64,
    pub matched: BTreeSet<PointId>,
}

/// Radius ("lasso") selection: every point whose marker would sit within
/// `radius_px` of the pointer is selected, boundary included.
///
/// Each pointer move is evaluated from scratch against the current viewport.
/// Large point sets go through an R-tree built lazily for the current point
/// set; small ones are scanned linearly.
pub struct RadiusSelectTool {
    config: SelectionConfig,
    subscription: Option<SubscriptionToken>,
    state: Option<SelectionState>,
    index: Option<PointIndex>,
}

impl RadiusSelectTool {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            config,
            subscription: None,
            state: None,
            index: None,
        }
    }

    /// Subscribes to pointer moves. Returns `false` if already active.
    pub fn activate(&mut self, registry: &mut SubscriptionRegistry, engine: &mut dyn MapEngine) -> bool {
        if self.subscription.is_some() {
            return false;
        }

        let token = registry.register(
            engine,
            EventKind::PointerMove,
            Box::new(|event: &MapEvent| event.position().map(EngineCommand::UpdateSelection)),
            Some(ScopeKey::SELECTION),
        );
        self.subscription = Some(token);
        log::debug!("radius selection active ({}px)", self.config.radius_px);
        true
    }

    /// Drops the selection and its pointer subscription. Returns `false` if
    /// the tool was not active.
    pub fn deactivate(&mut self, registry: &mut SubscriptionRegistry, engine: &mut dyn MapEngine) -> bool {
        self.state = None;
        let Some(token) = self.subscription.take() else {
            return false;
        };
        registry.unregister(engine, token);
        log::debug!("radius selection inactive");
        true
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Recomputes the matched set around `position`. Ignored while inactive.
    pub fn on_pointer_move(
        &mut self,
        position: Point,
        viewport: &Viewport,
        points: &[GeoPoint],
        generation: u64,
    ) -> Option<&SelectionState> {
        if !self.is_active() {
            return None;
        }

        let radius = self.config.radius_px.max(0.0);
        let within = |p: &GeoPoint| viewport.lat_lng_to_pixel(&p.position).distance_to(&position) <= radius;

        let matched: BTreeSet<PointId> = if points.len() >= self.config.index_threshold {
            let index = self.index_for(points, generation);
            // One pixel of slack so rounding in the inverse projection cannot
            // clip a point sitting exactly on the circle
            let pad = radius + 1.0;
            let area = LatLngBounds::from_corners(
                viewport.pixel_to_lat_lng(&Point::new(position.x - pad, position.y - pad)),
                viewport.pixel_to_lat_lng(&Point::new(position.x + pad, position.y + pad)),
            );
            index
                .query(&area)
                .into_iter()
                .filter_map(|slot| points.get(slot))
                .filter(|p| within(p))
                .map(|p| p.id)
                .collect()
        } else {
            points.iter().filter(|p| within(p)).map(|p| p.id).collect()
        };

        self.state = Some(SelectionState {
            center: position,
            radius_px: radius,
            matched,
        });
        self.state.as_ref()
    }

    fn index_for(&mut self, points: &[GeoPoint], generation: u64) -> &PointIndex {
        let stale = self
            .index
            .as_ref()
            .map_or(true, |index| index.generation() != generation);
        if stale {
            log::debug!("building selection index over {} points", points.len());
            self.index = None;
        }
        self.index
            .get_or_insert_with(|| PointIndex::build(points, generation))
    }

    pub fn state(&self) -> Option<&SelectionState> {
        self.state.as_ref()
    }

    pub fn radius(&self) -> f64 {
        self.config.radius_px
    }

    pub fn set_radius(&mut self, radius_px: f64) {
        self.config.radius_px = radius_px.max(0.0);
    }

    /// Drops the candidate index; it is rebuilt on the next large query
    pub fn invalidate_index(&mut self) {
        self.index = None;
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }
}
