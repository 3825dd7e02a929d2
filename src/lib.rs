//! Time-indexed playback of geographic entity tracks.
//!
//! Rows are ingested into per-entity sample sequences; a [`Player`] then moves a
//! time cursor over them and keeps one overlay per entity in sync, either
//! snapping to samples or interpolating between them along great circles.

pub mod core;
pub mod error;
pub mod events;
pub mod input;
pub mod overlay;
pub mod playback;
pub mod settings;

pub use crate::core::{DisplayOptions, DisplayOptionsUpdate, Geometry, LatLng, OverlayType, Sample, Timestamp, TraceConfig};
pub use crate::error::{PlayError, PlayResult};
pub use crate::events::{Event, EventEmitting, EventType, ListenerId};
pub use crate::overlay::{Overlay, OverlayFactory, OverlayRegistry, Surface};
pub use crate::playback::{Player, PlaybackMode, PlaybackState, TickTimer};
pub use crate::settings::Settings;
