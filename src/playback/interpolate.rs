use crate::core::{Geometry, Sample, Timestamp};

/// How far `time` is from `previous` towards `next`, clamped to `[0, 1]`
pub fn fraction(time: Timestamp, previous: Timestamp, next: Timestamp) -> f64 {
    let span = next - previous;
    if span <= 0.0 {
        return 0.0;
    }
    ((time - previous) / span).clamp(0.0, 1.0)
}

/// Geometry between two samples at `time`, along the great circle.
///
/// Only points interpolate; None when either side is a path, so callers snap instead.
pub fn interpolate(previous: &Sample, next: &Sample, time: Timestamp) -> Option<Geometry> {
    match (&previous.geometry, &next.geometry) {
        (Geometry::Point(a), Geometry::Point(b)) => {
            let t = fraction(time, previous.time, next.time);
            Some(Geometry::Point(a.interpolate(*b, t)))
        }
        _ => None,
    }
}
