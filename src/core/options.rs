use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which overlay factory renders an entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayType {
    #[default]
    Marker,
    Bubble,
    Heatmap,
    /// A factory registered under a caller-chosen name
    Custom(String),
}

impl fmt::Display for OverlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayType::Marker => write!(f, "marker"),
            OverlayType::Bubble => write!(f, "bubble"),
            OverlayType::Heatmap => write!(f, "heatmap"),
            OverlayType::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Trace configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub enabled: bool,

    /// Number of recent sample positions making up the trace path
    #[serde(default = "default_trace_length")]
    pub length: usize,

    /// Styling handed to the overlay as-is
    #[serde(default)]
    pub style: Value,
}

fn default_trace_length() -> usize {
    2
}

impl TraceConfig {
    pub fn enabled(style: Value) -> Self {
        Self {
            enabled: true,
            length: default_trace_length(),
            style,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            length: default_trace_length(),
            style: Value::Null,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// The trace always covers at least the current and previous positions
    pub fn path_length(&self) -> usize {
        self.length.max(2)
    }
}

/// Per-entity display configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Interpolate point positions between samples instead of snapping
    pub interpolated: bool,
    pub overlay_type: OverlayType,
    /// Options for the overlay factory, opaque to playback
    pub type_options: Value,
    pub trace: Option<TraceConfig>,
}

impl DisplayOptions {
    pub fn interpolated() -> Self {
        Self {
            interpolated: true,
            ..Self::default()
        }
    }

    pub fn tracing_enabled(&self) -> bool {
        self.trace.as_ref().is_some_and(|trace| trace.enabled)
    }
}

/// A partial change to [`DisplayOptions`]; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptionsUpdate {
    pub interpolated: Option<bool>,
    pub overlay_type: Option<OverlayType>,
    pub type_options: Option<Value>,
    pub trace: Option<TraceConfig>,
}

/// What an update actually changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedUpdate {
    pub overlay_type_changed: bool,
    pub trace_changed: bool,
}

impl DisplayOptionsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interpolated(mut self, interpolated: bool) -> Self {
        self.interpolated = Some(interpolated);
        self
    }

    pub fn overlay_type(mut self, overlay_type: OverlayType) -> Self {
        self.overlay_type = Some(overlay_type);
        self
    }

    pub fn type_options(mut self, options: Value) -> Self {
        self.type_options = Some(options);
        self
    }

    pub fn trace(mut self, trace: TraceConfig) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn apply(&self, options: &mut DisplayOptions) -> AppliedUpdate {
        let mut applied = AppliedUpdate::default();

        if let Some(interpolated) = self.interpolated {
            options.interpolated = interpolated;
        }
        if let Some(type_options) = &self.type_options {
            options.type_options = type_options.clone();
        }
        if let Some(trace) = &self.trace {
            applied.trace_changed = options.trace.as_ref() != Some(trace);
            options.trace = Some(trace.clone());
        }
        if let Some(overlay_type) = &self.overlay_type {
            applied.overlay_type_changed = *overlay_type != options.overlay_type;
            options.overlay_type = overlay_type.clone();
        }

        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_partial_update() {
        let mut options = DisplayOptions::default();
        let applied = DisplayOptionsUpdate::new()
            .interpolated(true)
            .apply(&mut options);

        assert!(options.interpolated);
        assert_eq!(options.overlay_type, OverlayType::Marker);
        assert_eq!(applied, AppliedUpdate::default());
    }

    #[test]
    fn test_apply_detects_type_change() {
        let mut options = DisplayOptions::default();
        let same = DisplayOptionsUpdate::new()
            .overlay_type(OverlayType::Marker)
            .apply(&mut options);
        assert!(!same.overlay_type_changed);

        let changed = DisplayOptionsUpdate::new()
            .overlay_type(OverlayType::Bubble)
            .apply(&mut options);
        assert!(changed.overlay_type_changed);
        assert_eq!(options.overlay_type, OverlayType::Bubble);
    }

    #[test]
    fn test_trace_length_floor() {
        let trace = TraceConfig::enabled(Value::Null).with_length(0);
        assert_eq!(trace.path_length(), 2);
        assert_eq!(trace.with_length(5).path_length(), 5);
    }

    #[test]
    fn test_deserialize_display_options() {
        let options: DisplayOptions = serde_json::from_str(
            r#"{"interpolated": true, "overlay_type": "bubble", "trace": {"enabled": true}}"#,
        )
        .unwrap();
        assert!(options.interpolated);
        assert_eq!(options.overlay_type, OverlayType::Bubble);
        assert!(options.tracing_enabled());
        assert_eq!(options.trace.unwrap().length, 2);
    }
}
