use serde_json::Value;
use tracing::{debug, info};

use crate::core::{DisplayOptions, LatLng, OverlayType};
use crate::overlay::{Overlay, OverlayResult, Surface};

/// Overlay that reports its commands through `tracing`, for headless replays
pub struct LoggingOverlay {
    entity: String,
    overlay_type: OverlayType,
    visible: bool,
}

impl LoggingOverlay {
    /// Usable directly as an [`OverlayFactory`](crate::overlay::OverlayFactory)
    pub fn factory(entity: &str, options: &DisplayOptions) -> OverlayResult<Box<dyn Overlay>> {
        Ok(Box::new(Self {
            entity: entity.to_string(),
            overlay_type: options.overlay_type.clone(),
            visible: true,
        }))
    }
}

impl Overlay for LoggingOverlay {
    fn attach_to(&mut self, surface: &Surface) {
        info!(entity = %self.entity, overlay = %self.overlay_type, surface = surface.name(), "overlay attached");
    }

    fn set_position(&mut self, point: LatLng) {
        if self.visible {
            info!(entity = %self.entity, lat = point.lat, lng = point.lng, "position");
        }
    }

    fn set_path(&mut self, path: &[LatLng]) {
        if self.visible {
            info!(entity = %self.entity, vertices = path.len(), "path");
        }
    }

    fn update_data(&mut self, payload: &Value) {
        debug!(entity = %self.entity, %payload, "data");
    }

    fn set_trace(&mut self, enabled: bool, _style: &Value) {
        debug!(entity = %self.entity, enabled, "trace");
    }

    fn set_trace_path(&mut self, points: &[LatLng]) {
        debug!(entity = %self.entity, points = points.len(), "trace path");
    }

    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn release(&mut self) {
        info!(entity = %self.entity, "overlay released");
    }
}
