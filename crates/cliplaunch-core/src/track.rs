//! Track (grid column) identity

use serde::{Deserialize, Serialize};

use crate::clip::Rgba;

/// A launcher column. Slots are addressed by the track index, tracks don't own them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    index: usize,
    pub name: String,
    pub color: Rgba,
}

impl Track {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            color: Rgba::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}
