pub mod logging;
pub mod recording;

pub use logging::LoggingOverlay;
pub use recording::{OverlayCommand, OverlayLog, RecordingFactory, RecordingOverlay};

use std::cell::Cell;
use std::collections::BTreeMap;
use std::error::Error;
use std::rc::Rc;

use serde_json::Value;

use crate::core::{DisplayOptions, Geometry, LatLng, OverlayType};
use crate::error::PlayError;

/// Result type for overlay collaborators
pub type OverlayResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// A named rendering target overlays attach to.
///
/// Cloning yields another handle to the same surface.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    name: String,
    attached: Rc<Cell<usize>>,
}

impl Surface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attached: Rc::new(Cell::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Called by overlays when they attach
    pub fn attach(&self) {
        self.attached.set(self.attached.get() + 1);
    }

    /// Called by overlays when they are released
    pub fn detach(&self) {
        self.attached.set(self.attached.get().saturating_sub(1));
    }

    /// Number of overlays currently attached
    pub fn attached_count(&self) -> usize {
        self.attached.get()
    }
}

/// Visual representation of one entity, owned by the rendering collaborator
///
/// Playback only issues commands; how they are drawn is up to the implementation.
pub trait Overlay {
    fn attach_to(&mut self, surface: &Surface);

    fn set_position(&mut self, point: LatLng);

    fn set_path(&mut self, path: &[LatLng]);

    /// The raw row of the sample now being shown
    fn update_data(&mut self, payload: &Value);

    fn set_trace(&mut self, enabled: bool, style: &Value);

    fn set_trace_path(&mut self, points: &[LatLng]);

    fn show(&mut self);

    fn hide(&mut self);

    /// Detach from the surface and free rendering resources
    fn release(&mut self);
}

/// Write a geometry to an overlay, picking the command by geometry kind
pub fn write_geometry(overlay: &mut dyn Overlay, geometry: &Geometry) {
    match geometry {
        Geometry::Point(pt) => overlay.set_position(*pt),
        Geometry::Path(pts) => overlay.set_path(pts),
    }
}

/// Builds overlays of one [`OverlayType`]
pub trait OverlayFactory {
    fn create(&self, entity: &str, options: &DisplayOptions) -> OverlayResult<Box<dyn Overlay>>;
}

impl<F> OverlayFactory for F
where
    F: Fn(&str, &DisplayOptions) -> OverlayResult<Box<dyn Overlay>>,
{
    fn create(&self, entity: &str, options: &DisplayOptions) -> OverlayResult<Box<dyn Overlay>> {
        self(entity, options)
    }
}

/// Overlay factories keyed by type, constructed and owned by whoever builds the player
#[derive(Default)]
pub struct OverlayRegistry {
    factories: BTreeMap<OverlayType, Box<dyn OverlayFactory>>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any factory already registered for `overlay_type`
    pub fn register<F>(&mut self, overlay_type: OverlayType, factory: F) -> &mut Self
    where
        F: OverlayFactory + 'static,
    {
        self.factories.insert(overlay_type, Box::new(factory));
        self
    }

    pub fn contains(&self, overlay_type: &OverlayType) -> bool {
        self.factories.contains_key(overlay_type)
    }

    pub fn create(&self, entity: &str, options: &DisplayOptions) -> Result<Box<dyn Overlay>, PlayError> {
        let factory = self.factories.get(&options.overlay_type).ok_or_else(|| {
            PlayError::configuration(format!(
                "no overlay factory registered for {}",
                options.overlay_type
            ))
        })?;
        factory
            .create(entity, options)
            .map_err(|err| PlayError::Overlay(format!("{entity}: {err}")))
    }
}
