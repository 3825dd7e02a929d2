use std::fmt;
use std::ops::Sub;

use serde::{Deserialize, Serialize};

use crate::core::Geometry;

/// A position on the playback axis, in seconds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub f64);

impl Timestamp {
    pub fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Move forward (or backward, for negative values) by `seconds`
    pub fn advance(self, seconds: f64) -> Self {
        Self(self.0 + seconds)
    }
}

impl Sub for Timestamp {
    type Output = f64;

    fn sub(self, rhs: Timestamp) -> f64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

/// One record of an entity's track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the entity was at `geometry`
    pub time: Timestamp,

    /// Where the entity was
    pub geometry: Geometry,

    /// The raw row this sample was parsed from, handed to overlays untouched
    pub payload: serde_json::Value,
}

impl Sample {
    pub fn new(time: Timestamp, geometry: Geometry, payload: serde_json::Value) -> Self {
        Self {
            time,
            geometry,
            payload,
        }
    }
}
