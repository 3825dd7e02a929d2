use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

use crate::core::{DisplayOptions, LatLng, OverlayType};
use crate::overlay::{Overlay, OverlayFactory, OverlayResult, Surface};

/// A command received by a [`RecordingOverlay`]
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCommand {
    Attached(String),
    Position(LatLng),
    Path(Vec<LatLng>),
    Data(Value),
    Trace(bool),
    TracePath(Vec<LatLng>),
    Show,
    Hide,
    Released,
}

impl OverlayCommand {
    pub fn is_geometry_write(&self) -> bool {
        matches!(self, OverlayCommand::Position(_) | OverlayCommand::Path(_))
    }
}

/// One logged command
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// Serial number of the overlay, in creation order
    pub overlay: usize,
    pub entity: String,
    pub overlay_type: OverlayType,
    pub command: OverlayCommand,
}

/// Shared log of every command sent to overlays from one [`RecordingFactory`]
#[derive(Debug, Clone, Default)]
pub struct OverlayLog {
    inner: Rc<RefCell<Vec<Recorded>>>,
}

impl OverlayLog {
    fn push(&self, recorded: Recorded) {
        self.inner.borrow_mut().push(recorded);
    }

    pub fn all(&self) -> Vec<Recorded> {
        self.inner.borrow().clone()
    }

    /// Commands received by overlays of `entity`
    pub fn commands_for(&self, entity: &str) -> Vec<OverlayCommand> {
        self.inner
            .borrow()
            .iter()
            .filter(|rec| rec.entity == entity)
            .map(|rec| rec.command.clone())
            .collect()
    }

    pub fn geometry_writes(&self, entity: &str) -> usize {
        self.commands_for(entity)
            .iter()
            .filter(|cmd| cmd.is_geometry_write())
            .count()
    }

    pub fn last_position(&self, entity: &str) -> Option<LatLng> {
        self.commands_for(entity)
            .iter()
            .rev()
            .find_map(|cmd| match cmd {
                OverlayCommand::Position(pt) => Some(*pt),
                _ => None,
            })
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }
}

/// Overlay that renders nothing and records every command
///
/// Used as the rendering collaborator in tests and dry runs.
pub struct RecordingOverlay {
    serial: usize,
    entity: String,
    overlay_type: OverlayType,
    log: OverlayLog,
    surface: Option<Surface>,
}

impl RecordingOverlay {
    fn record(&self, command: OverlayCommand) {
        self.log.push(Recorded {
            overlay: self.serial,
            entity: self.entity.clone(),
            overlay_type: self.overlay_type.clone(),
            command,
        });
    }
}

impl Overlay for RecordingOverlay {
    fn attach_to(&mut self, surface: &Surface) {
        surface.attach();
        self.surface = Some(surface.clone());
        self.record(OverlayCommand::Attached(surface.name().to_string()));
    }

    fn set_position(&mut self, point: LatLng) {
        self.record(OverlayCommand::Position(point));
    }

    fn set_path(&mut self, path: &[LatLng]) {
        self.record(OverlayCommand::Path(path.to_vec()));
    }

    fn update_data(&mut self, payload: &Value) {
        self.record(OverlayCommand::Data(payload.clone()));
    }

    fn set_trace(&mut self, enabled: bool, _style: &Value) {
        self.record(OverlayCommand::Trace(enabled));
    }

    fn set_trace_path(&mut self, points: &[LatLng]) {
        self.record(OverlayCommand::TracePath(points.to_vec()));
    }

    fn show(&mut self) {
        self.record(OverlayCommand::Show);
    }

    fn hide(&mut self) {
        self.record(OverlayCommand::Hide);
    }

    fn release(&mut self) {
        if let Some(surface) = self.surface.take() {
            surface.detach();
        }
        self.record(OverlayCommand::Released);
    }
}

/// Factory handing out [`RecordingOverlay`]s that share one [`OverlayLog`]
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    log: OverlayLog,
    created: Rc<Cell<usize>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> OverlayLog {
        self.log.clone()
    }

    /// Total overlays created so far, across every clone of this factory
    pub fn created(&self) -> usize {
        self.created.get()
    }
}

impl OverlayFactory for RecordingFactory {
    fn create(&self, entity: &str, options: &DisplayOptions) -> OverlayResult<Box<dyn Overlay>> {
        let serial = self.created.get();
        self.created.set(serial + 1);
        Ok(Box::new(RecordingOverlay {
            serial,
            entity: entity.to_string(),
            overlay_type: options.overlay_type.clone(),
            log: self.log.clone(),
            surface: None,
        }))
    }
}
