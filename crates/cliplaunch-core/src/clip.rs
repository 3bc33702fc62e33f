//! Launchable clip definitions

use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, Result};

/// RGBA color (0-255 per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::opaque(0x8c, 0x8c, 0x8c)
    }
}

/// A clip that can sit in a launcher slot.
///
/// Immutable once created; replacing a slot's clip means assigning a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchClip {
    name: String,
    color: Rgba,
    /// Length in beats (always > 0)
    length_beats: f64,
    /// Whether playback wraps around at the end
    looped: bool,
}

impl LaunchClip {
    pub fn new(name: impl Into<String>, length_beats: f64, looped: bool) -> Result<Self> {
        if !length_beats.is_finite() || length_beats <= 0.0 {
            return Err(LauncherError::InvalidClipLength(length_beats));
        }
        Ok(Self {
            name: name.into(),
            color: Rgba::default(),
            length_beats,
            looped,
        })
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn length_beats(&self) -> f64 {
        self.length_beats
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    /// Length in whole bars, rounded up
    pub fn length_bars(&self, beats_per_bar: u32) -> u32 {
        (self.length_beats / beats_per_bar.max(1) as f64).ceil() as u32
    }
}
