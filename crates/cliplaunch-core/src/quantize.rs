//! Launch quantization grid

use serde::{Deserialize, Serialize};

/// Granularity at which queued launches and stops are allowed to commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizeMode {
    /// No snapping, requests commit on the next tick
    None,
    Sixteenth,
    Eighth,
    Beat,
    #[default]
    Bar,
}

impl QuantizeMode {
    pub const ALL: [QuantizeMode; 5] = [
        Self::None,
        Self::Sixteenth,
        Self::Eighth,
        Self::Beat,
        Self::Bar,
    ];

    /// Length of one grid step in beats (0 for `None`)
    pub fn unit(&self, beats_per_bar: u32) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Sixteenth => 0.25,
            Self::Eighth => 0.5,
            Self::Beat => 1.0,
            Self::Bar => beats_per_bar.max(1) as f64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sixteenth => "1/16",
            Self::Eighth => "1/8",
            Self::Beat => "1 Beat",
            Self::Bar => "1 Bar",
        }
    }
}

/// Next beat at which an action requested at `current_beat` may take effect.
///
/// A request issued exactly on a grid line waits for the following line, so for every
/// mode except `None` the result is strictly greater than `current_beat` and at most one
/// unit away. `None` returns `current_beat` itself.
///
/// # Example
/// ```
/// use cliplaunch_core::{next_boundary, QuantizeMode};
/// assert_eq!(next_boundary(5.5, QuantizeMode::Bar, 4), 8.0);
/// assert_eq!(next_boundary(3.0, QuantizeMode::Beat, 4), 4.0);
/// ```
pub fn next_boundary(current_beat: f64, mode: QuantizeMode, beats_per_bar: u32) -> f64 {
    let unit = mode.unit(beats_per_bar);
    if unit <= 0.0 {
        return current_beat;
    }

    let k = (current_beat / unit).floor() + 1.0;
    let boundary = k * unit;

    // Guard against the division landing one ulp below an exact grid line
    if boundary <= current_beat {
        boundary + unit
    } else {
        boundary
    }
}
