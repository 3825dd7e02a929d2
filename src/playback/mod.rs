pub mod engine;
pub mod interpolate;
pub mod resolver;
pub mod store;
pub mod timer;
pub mod tracker;

pub use engine::Player;
pub use resolver::{resolve, Resolution};
pub use store::{Entity, EntityStore, IngestSummary};
pub use timer::TickTimer;
pub use tracker::EntityUpdate;

use serde::{Deserialize, Serialize};

use crate::core::Timestamp;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Playing,
}

/// How time is driven
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackMode {
    /// A timer advances time by `tick_increment` seconds per tick while playing
    Continuous {
        state: PlaybackState,
        tick_increment: f64,
    },
    /// Callers move time themselves
    Discrete,
}

/// When `EndOfData` fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfDataPolicy {
    /// On every time change that lands past the stop time
    #[default]
    EveryCall,
    /// Only when time crosses from at-or-before the stop time to past it
    EdgeTriggered,
}

/// Snapshot of the player's clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub current_time: Timestamp,
    pub start_time: Option<Timestamp>,
    pub stop_time: Option<Timestamp>,
    pub paused: bool,
    /// None in discrete mode
    pub tick_increment: Option<f64>,
}
