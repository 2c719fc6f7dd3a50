//! Persisted layout
//!
//! Node positions and viewport state saved per workspace by an external
//! store. The canvas accepts one at init and emits a fresh one on save.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedViewport {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Layout saved for one workspace
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistedLayout {
    pub workspace_id: String,
    #[serde(default)]
    pub positions: BTreeMap<NodeId, SavedPosition>,
    #[serde(default)]
    pub viewport: Option<SavedViewport>,
}

impl PersistedLayout {
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            positions: BTreeMap::new(),
            viewport: None,
        }
    }

    pub fn with_position(mut self, id: impl Into<String>, x: f32, y: f32) -> Self {
        self.positions.insert(id.into(), SavedPosition { x, y });
        self
    }
}
