use std::borrow::Cow;

use tracing::{debug, warn};

use crate::core::{Geometry, LatLng, Sample, Timestamp};
use crate::overlay::{write_geometry, OverlayRegistry, Surface};
use crate::playback::interpolate::interpolate;
use crate::playback::resolver::{resolve, Resolution};
use crate::playback::store::Entity;

/// What one refresh did to one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityUpdate {
    pub resolution: Resolution,
    /// A new overlay was created this pass
    pub created: bool,
    pub geometry_written: bool,
    /// The resolved index differed from the cached one
    pub index_changed: bool,
}

/// Bring an entity's overlay in line with `time`, skipping redundant writes.
///
/// Never fails: empty entities are skipped and an overlay that cannot be
/// created is logged and retried on the next pass.
pub fn refresh_entity(
    entity: &mut Entity,
    time: Timestamp,
    registry: &OverlayRegistry,
    surface: &Surface,
) -> Option<EntityUpdate> {
    let resolution = resolve(&entity.samples, time, entity.current_index)?;
    let mut update = EntityUpdate {
        resolution,
        created: false,
        geometry_written: false,
        index_changed: false,
    };

    if entity.overlay.is_none() {
        let mut overlay = match registry.create(&entity.name, &entity.display) {
            Ok(overlay) => overlay,
            Err(err) => {
                warn!(entity = %entity.name, "skipping refresh: {err}");
                return None;
            }
        };
        overlay.attach_to(surface);
        if let Some(trace) = &entity.display.trace {
            overlay.set_trace(trace.enabled, &trace.style);
        }
        if !entity.visible {
            overlay.hide();
        }
        debug!(entity = %entity.name, overlay = %entity.display.overlay_type, "overlay created");
        entity.overlay = Some(overlay);
        entity.current_index = None;
        update.created = true;
    }

    let Entity {
        name,
        samples,
        current_index,
        overlay,
        display,
        ..
    } = entity;
    let Some(overlay) = overlay.as_mut() else {
        return None;
    };

    let cached = *current_index;
    let geometry = match resolution {
        // Boundary samples are always written
        Resolution::Fixed(idx) => Some(Cow::Borrowed(&samples[idx].geometry)),
        Resolution::Interval { previous, next } if display.interpolated => {
            match interpolate(&samples[previous], &samples[next], time) {
                Some(geometry) => Some(Cow::Owned(geometry)),
                None => snapped(samples, cached, next),
            }
        }
        Resolution::Interval { next, .. } => snapped(samples, cached, next),
    };

    if let Some(geometry) = geometry {
        write_geometry(&mut **overlay, &geometry);
        update.geometry_written = true;
    }

    let idx = resolution.index();
    if *current_index != Some(idx) {
        debug!(entity = %name, from = ?current_index, to = idx, "index changed");
        *current_index = Some(idx);
        overlay.update_data(&samples[idx].payload);
        if let Some(trace) = display.trace.as_ref().filter(|trace| trace.enabled) {
            if idx > 0 {
                overlay.set_trace_path(&trace_path(samples, idx, trace.path_length()));
            }
        }
        update.index_changed = true;
    }

    Some(update)
}

/// The upcoming sample's geometry, unless it is already showing
fn snapped(samples: &[Sample], cached: Option<usize>, next: usize) -> Option<Cow<'_, Geometry>> {
    (cached != Some(next)).then(|| Cow::Borrowed(&samples[next].geometry))
}

/// Positions of the `len` samples ending at `idx`, oldest first
fn trace_path(samples: &[Sample], idx: usize, len: usize) -> Vec<LatLng> {
    let start = (idx + 1).saturating_sub(len);
    samples[start..=idx]
        .iter()
        .filter_map(|sample| sample.geometry.anchor())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DisplayOptions, DisplayOptionsUpdate, OverlayType, TraceConfig};
    use crate::input::{EntityKey, IngestSpec, Parsers};
    use crate::overlay::{OverlayCommand, RecordingFactory};
    use crate::playback::store::EntityStore;
    use serde_json::{json, Value};

    struct Fixture {
        store: EntityStore,
        registry: OverlayRegistry,
        surface: Surface,
        factory: RecordingFactory,
    }

    impl Fixture {
        fn new(rows: Vec<Value>, display: DisplayOptions) -> Self {
            let factory = RecordingFactory::new();
            let mut registry = OverlayRegistry::new();
            registry.register(OverlayType::Marker, factory.clone());
            registry.register(OverlayType::Bubble, factory.clone());

            let mut store = EntityStore::new();
            let spec = IngestSpec::new(EntityKey::Named("A".to_string())).display(display);
            store.ingest(&spec, &rows, &Parsers::default()).unwrap();

            Self {
                store,
                registry,
                surface: Surface::new("test"),
                factory,
            }
        }

        fn at(&mut self, t: f64) -> Option<EntityUpdate> {
            let entity = self.store.get_mut("A").unwrap();
            refresh_entity(entity, Timestamp(t), &self.registry, &self.surface)
        }
    }

    fn three_points() -> Vec<Value> {
        vec![
            json!([0, "0,0", "a"]),
            json!([10, "10,0", "b"]),
            json!([20, "20,0", "c"]),
        ]
    }

    #[test]
    fn test_snapped_interval_is_written_once() {
        let mut fx = Fixture::new(three_points(), DisplayOptions::default());

        let first = fx.at(2.0).unwrap();
        assert!(first.created && first.geometry_written && first.index_changed);

        let second = fx.at(4.0).unwrap();
        assert_eq!(second.resolution, Resolution::Interval { previous: 0, next: 1 });
        assert!(!second.geometry_written);
        assert!(!second.index_changed);

        let third = fx.at(12.0).unwrap();
        assert!(third.geometry_written && third.index_changed);

        let log = fx.factory.log();
        assert_eq!(log.geometry_writes("A"), 2);
        // Snapping shows the upcoming sample
        assert_eq!(log.last_position("A"), Some(LatLng::new(0.0, 20.0)));
        assert_eq!(fx.factory.created(), 1);
    }

    #[test]
    fn test_interpolated_interval_always_written() {
        let mut fx = Fixture::new(three_points(), DisplayOptions::interpolated());

        fx.at(2.5).unwrap();
        let again = fx.at(5.0).unwrap();
        assert!(again.geometry_written);
        assert!(!again.index_changed);

        let log = fx.factory.log();
        assert_eq!(log.geometry_writes("A"), 2);
        let pt = log.last_position("A").unwrap();
        assert!((pt.lng - 5.0).abs() < 1e-9);
        assert!(pt.lat.abs() < 1e-9);
    }

    #[test]
    fn test_fixed_always_written() {
        let mut fx = Fixture::new(three_points(), DisplayOptions::default());

        for t in [30.0, 40.0, 50.0] {
            let update = fx.at(t).unwrap();
            assert_eq!(update.resolution, Resolution::Fixed(2));
            assert!(update.geometry_written);
        }
        let log = fx.factory.log();
        assert_eq!(log.geometry_writes("A"), 3);
        let data_pushes = log
            .commands_for("A")
            .iter()
            .filter(|cmd| matches!(cmd, OverlayCommand::Data(_)))
            .count();
        assert_eq!(data_pushes, 1);
    }

    #[test]
    fn test_paths_snap_even_when_interpolated() {
        let rows = vec![
            json!([0, [[0, 0], [1, 1]]]),
            json!([10, [[2, 2], [3, 3]]]),
        ];
        let mut fx = Fixture::new(rows, DisplayOptions::interpolated());

        fx.at(2.0).unwrap();
        let second = fx.at(3.0).unwrap();
        assert!(!second.geometry_written);
        assert_eq!(
            fx.factory.log().commands_for("A")[1],
            OverlayCommand::Path(vec![LatLng::new(2.0, 2.0), LatLng::new(3.0, 3.0)])
        );
    }

    #[test]
    fn test_trace_path_follows_index() {
        let display = DisplayOptions {
            trace: Some(TraceConfig::enabled(json!({"stroke": "#FAA"})).with_length(3)),
            ..DisplayOptions::default()
        };
        let mut fx = Fixture::new(three_points(), display);

        fx.at(25.0).unwrap();
        let commands = fx.factory.log().commands_for("A");
        assert!(commands.contains(&OverlayCommand::Trace(true)));
        assert_eq!(
            commands.last(),
            Some(&OverlayCommand::TracePath(vec![
                LatLng::new(0.0, 0.0),
                LatLng::new(0.0, 10.0),
                LatLng::new(0.0, 20.0),
            ]))
        );
    }

    #[test]
    fn test_type_change_recreates_overlay() {
        let mut fx = Fixture::new(three_points(), DisplayOptions::default());
        fx.at(5.0).unwrap();

        fx.store
            .set_display_options(None, &DisplayOptionsUpdate::new().overlay_type(OverlayType::Bubble))
            .unwrap();
        assert_eq!(fx.surface.attached_count(), 0);
        assert_eq!(fx.store.get("A").unwrap().current_index(), None);

        let update = fx.at(6.0).unwrap();
        assert!(update.created && update.geometry_written);
        assert_eq!(fx.factory.created(), 2);
        assert_eq!(fx.surface.attached_count(), 1);
    }

    #[test]
    fn test_hidden_entity_overlay_starts_hidden() {
        let mut fx = Fixture::new(three_points(), DisplayOptions::default());
        fx.store.set_visibility(Some("A"), false);
        fx.at(1.0).unwrap();
        assert!(fx
            .factory
            .log()
            .commands_for("A")
            .contains(&OverlayCommand::Hide));
    }

    #[test]
    fn test_unregistered_type_is_absorbed() {
        let display = DisplayOptions {
            overlay_type: OverlayType::Heatmap,
            ..DisplayOptions::default()
        };
        let mut fx = Fixture::new(three_points(), display);
        assert_eq!(fx.at(1.0), None);
        assert!(!fx.store.get("A").unwrap().has_overlay());
    }
}
