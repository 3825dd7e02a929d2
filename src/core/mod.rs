pub mod geometry;
pub mod options;
pub mod sample;

pub use geometry::{Geometry, LatLng};
pub use options::{AppliedUpdate, DisplayOptions, DisplayOptionsUpdate, OverlayType, TraceConfig};
pub use sample::{Sample, Timestamp};
