use crate::core::{Sample, Timestamp};

/// Which sample(s) apply to an entity at a given time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Pinned to one sample: the only one, the first (before the range) or the last (after it)
    Fixed(usize),
    /// Between two bracketing samples
    Interval { previous: usize, next: usize },
}

impl Resolution {
    /// The sample index the entity is considered to be at
    pub fn index(self) -> usize {
        match self {
            Resolution::Fixed(idx) => idx,
            Resolution::Interval { next, .. } => next,
        }
    }
}

/// Resolve `time` against samples sorted ascending by time.
///
/// `hint` is the index resolved last time. When time only moved forward the scan
/// starts there; otherwise it binary searches. None for an empty sequence.
pub fn resolve(samples: &[Sample], time: Timestamp, hint: Option<usize>) -> Option<Resolution> {
    match samples.len() {
        0 => return None,
        1 => return Some(Resolution::Fixed(0)),
        _ => {}
    }

    let idx = first_after(samples, time, hint);
    Some(if idx == 0 {
        Resolution::Fixed(0)
    } else if idx == samples.len() {
        Resolution::Fixed(samples.len() - 1)
    } else {
        Resolution::Interval {
            previous: idx - 1,
            next: idx,
        }
    })
}

/// Smallest index whose time is strictly after `time`, or `samples.len()`
fn first_after(samples: &[Sample], time: Timestamp, hint: Option<usize>) -> usize {
    match hint {
        // Everything before the hint is known to be at or before `time`
        Some(start) if start >= 1 && start < samples.len() && samples[start - 1].time <= time => {
            samples[start..]
                .iter()
                .position(|sample| sample.time > time)
                .map_or(samples.len(), |offset| start + offset)
        }
        _ => samples.partition_point(|sample| sample.time <= time),
    }
}
