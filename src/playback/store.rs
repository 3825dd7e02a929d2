use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::core::{DisplayOptions, DisplayOptionsUpdate, Sample, Timestamp};
use crate::error::{DataError, PlayError};
use crate::input::{IngestSpec, Parsers, Row};
use crate::overlay::Overlay;

/// A named subject with its own track and overlay
pub struct Entity {
    pub(crate) name: String,
    pub(crate) samples: Vec<Sample>,
    /// Index written to the overlay last; None forces the next refresh to write
    pub(crate) current_index: Option<usize>,
    pub(crate) overlay: Option<Box<dyn Overlay>>,
    pub(crate) display: DisplayOptions,
    pub(crate) visible: bool,
}

impl Entity {
    fn new(name: String, display: DisplayOptions) -> Self {
        Self {
            name,
            samples: Vec::new(),
            current_index: None,
            overlay: None,
            display,
            visible: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sorted ascending by time, ties in insertion order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn display_options(&self) -> &DisplayOptions {
        &self.display
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn release_overlay(&mut self) {
        if let Some(mut overlay) = self.overlay.take() {
            overlay.release();
        }
        self.current_index = None;
    }

    fn apply_display(&mut self, update: &DisplayOptionsUpdate) {
        let applied = update.apply(&mut self.display);
        if applied.overlay_type_changed {
            debug!(entity = %self.name, overlay = %self.display.overlay_type, "overlay type changed");
            self.release_overlay();
        }
        if applied.trace_changed {
            if let (Some(overlay), Some(trace)) = (self.overlay.as_mut(), self.display.trace.as_ref()) {
                overlay.set_trace(trace.enabled, &trace.style);
            }
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if let Some(overlay) = self.overlay.as_mut() {
            if visible {
                overlay.show();
            } else {
                overlay.hide();
            }
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("samples", &self.samples.len())
            .field("current_index", &self.current_index)
            .field("has_overlay", &self.overlay.is_some())
            .field("display", &self.display)
            .field("visible", &self.visible)
            .finish()
    }
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub rows: usize,
    pub entities: usize,
}

/// Per-entity time-ordered samples plus the global time range
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: BTreeMap<String, Entity>,
    start_time: Option<Timestamp>,
    stop_time: Option<Timestamp>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `rows` to their entities and re-sort them.
    ///
    /// On a bad row, ingestion stops there: rows before it stay ingested (and
    /// sorted) but the time range is not recomputed.
    pub fn ingest(
        &mut self,
        spec: &IngestSpec,
        rows: &[Row],
        parsers: &Parsers,
    ) -> Result<IngestSummary, PlayError> {
        // entity name -> sample count before this batch
        let mut touched: BTreeMap<String, usize> = BTreeMap::new();
        let mut failure = None;

        for (row_idx, row) in rows.iter().enumerate() {
            match parse_row(spec, row, parsers) {
                Ok((name, sample)) => {
                    let entity = self.entities.entry(name.clone()).or_insert_with(|| {
                        debug!(entity = %name, "new entity");
                        Entity::new(name.clone(), spec.display.clone().unwrap_or_default())
                    });
                    touched.entry(name).or_insert(entity.samples.len());
                    entity.samples.push(sample);
                }
                Err(source) => {
                    failure = Some(PlayError::Data {
                        row: row_idx,
                        source,
                    });
                    break;
                }
            }
        }

        for (name, old_len) in &touched {
            if let Some(entity) = self.entities.get_mut(name) {
                sort_appended(entity, *old_len);
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        self.recompute_range();
        info!(
            rows = rows.len(),
            entities = touched.len(),
            start = ?self.start_time,
            stop = ?self.stop_time,
            "ingested"
        );
        Ok(IngestSummary {
            rows: rows.len(),
            entities: touched.len(),
        })
    }

    fn recompute_range(&mut self) {
        let mut start: Option<Timestamp> = None;
        let mut stop: Option<Timestamp> = None;
        for entity in self.entities.values() {
            if let (Some(first), Some(last)) = (entity.samples.first(), entity.samples.last()) {
                if start.map_or(true, |s| first.time < s) {
                    start = Some(first.time);
                }
                if stop.map_or(true, |s| last.time > s) {
                    stop = Some(last.time);
                }
            }
        }
        self.start_time = start;
        self.stop_time = stop;
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    pub fn stop_time(&self) -> Option<Timestamp> {
        self.stop_time
    }

    pub fn entities(&self) -> &BTreeMap<String, Entity> {
        &self.entities
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.get_mut(name)
    }

    /// Entity names, detached from the map so it can be mutated while iterating
    pub fn names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    /// Apply `update` to one entity, or to all of them when `name` is None
    pub fn set_display_options(
        &mut self,
        name: Option<&str>,
        update: &DisplayOptionsUpdate,
    ) -> Result<(), PlayError> {
        match name {
            Some(name) => {
                let entity = self
                    .entities
                    .get_mut(name)
                    .ok_or_else(|| PlayError::configuration(format!("no entity named {name:?}")))?;
                entity.apply_display(update);
            }
            None => {
                for entity in self.entities.values_mut() {
                    entity.apply_display(update);
                }
            }
        }
        Ok(())
    }

    /// Unknown names are ignored
    pub fn set_visibility(&mut self, name: Option<&str>, visible: bool) {
        match name {
            Some(name) => {
                if let Some(entity) = self.entities.get_mut(name) {
                    entity.set_visible(visible);
                }
            }
            None => {
                for entity in self.entities.values_mut() {
                    entity.set_visible(visible);
                }
            }
        }
    }

    /// Release every overlay and forget all entities
    pub fn clear(&mut self) {
        for entity in self.entities.values_mut() {
            entity.release_overlay();
        }
        self.entities.clear();
        self.start_time = None;
        self.stop_time = None;
    }
}

fn parse_row(spec: &IngestSpec, row: &Row, parsers: &Parsers) -> Result<(String, Sample), DataError> {
    let name = spec.entity.resolve(row)?;
    let time = parsers.time.parse_time(&*spec.time_of(row)?)?;
    let geometry = parsers.geometry.parse_geometry(&*spec.geometry_of(row)?)?;
    Ok((name, Sample::new(time, geometry, row.clone())))
}

/// Stable sort after appending. The cached index survives only when every new
/// sample landed after the existing ones.
fn sort_appended(entity: &mut Entity, old_len: usize) {
    let reordered = match (old_len.checked_sub(1), entity.samples.get(old_len..)) {
        (Some(last_old), Some(appended)) => {
            let last_old_time = entity.samples[last_old].time;
            appended.iter().any(|sample| sample.time < last_old_time)
        }
        _ => false,
    };

    entity.samples.sort_by(|a, b| a.time.0.total_cmp(&b.time.0));

    if reordered {
        entity.current_index = None;
    }
}
