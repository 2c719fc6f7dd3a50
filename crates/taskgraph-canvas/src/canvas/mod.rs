//! Task graph canvas
//!
//! Scene engine behind an interactive node graph of agents, tasks and
//! combiners that a backend mutates live while a human edits it.
//!
//! # Architecture
//!
//! ```text
//! CanvasEvent (from server)        CanvasInput (pointer / keys)
//!        │                                  │
//!        ▼                                  ▼
//! EventReconciler              InteractionController ──► SpatialIndex
//!        │                                  │                 (hit tests)
//!        └──────────► SceneModel ◄──────────┘
//!                         │
//!                         ├──► LayoutEngine (levels, fallback slots)
//!                         ├──► AnimationClock (pulse, particles)
//!                         └──► Viewport (pan / zoom transform)
//!                                   │
//!                                   ▼
//!                     Effect::Request(CanvasIntent) ──► backend
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut engine = CanvasEngine::new("workspace-1");
//! engine.apply_event(&event);
//! engine.handle_input(&CanvasInput::press(120.0, 80.0));
//! for effect in engine.drain_effects() { /* send requests, open panels */ }
//! ```

pub mod animation;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod overlay;
pub mod reconcile;
pub mod scene;
pub mod spatial;
pub mod viewport;

pub use animation::{AnimationClock, Particle};
pub use input::{CanvasInput, Effect, InteractionController, InteractionState, Key, PointerButton};
pub use layout::LayoutEngine;
pub use overlay::{ContextMenu, MenuAction, ModalForm};
pub use reconcile::{Applied, EventReconciler};
pub use scene::{
    Connection, ConnectionError, ExecutionEntry, Node, NodeBody, NodeKind, PortDirection, PortRef,
    SceneModel,
};
pub use spatial::SpatialIndex;
pub use viewport::Viewport;

use egui::CursorIcon;
use taskgraph_types::{CanvasEvent, CanvasIntent, PersistedLayout, TaskStatus};

use crate::config::{global_config, CanvasSettings};

// =============================================================================
// CANVAS ENGINE
// =============================================================================

/// One workspace's canvas: scene, viewport, interaction and animation
#[derive(Debug, Clone)]
pub struct CanvasEngine {
    workspace_id: String,
    scene: SceneModel,
    viewport: Viewport,
    controller: InteractionController,
    reconciler: EventReconciler,
    layout: LayoutEngine,
    clock: AnimationClock,
    /// Resolved effects waiting for the embedder
    effects: Vec<Effect>,
}

impl CanvasEngine {
    /// Engine configured from [`global_config()`]
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self::with_settings(workspace_id, global_config())
    }

    pub fn with_settings(workspace_id: impl Into<String>, settings: &CanvasSettings) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            scene: SceneModel::new(settings.geometry.clone(), settings.layout.clone()),
            viewport: Viewport::new(settings.viewport.clone()),
            controller: InteractionController::new(
                settings.interaction.clone(),
                &settings.viewport,
            ),
            reconciler: EventReconciler::new(settings.reconciler.clone()),
            layout: LayoutEngine::new(settings.layout.clone()),
            clock: AnimationClock::new(settings.animation.clone()),
            effects: Vec::new(),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn scene(&self) -> &SceneModel {
        &self.scene
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    pub fn cursor_for_state(&self) -> CursorIcon {
        self.controller.cursor_for_state()
    }

    /// Seed positions and viewport from a saved layout
    pub fn load_layout(&mut self, layout: &PersistedLayout) -> usize {
        if layout.workspace_id != self.workspace_id {
            tracing::warn!(
                expected = %self.workspace_id,
                got = %layout.workspace_id,
                "Ignoring layout for another workspace"
            );
            return 0;
        }
        if let Some(saved) = &layout.viewport {
            self.viewport.restore(saved);
        }
        let applied = self.scene.apply_saved_layout(layout);
        tracing::debug!(
            applied,
            pending = layout.positions.len() - applied,
            "Loaded saved layout"
        );
        applied
    }

    /// Feed one input. Returns true if the canvas needs a repaint.
    pub fn handle_input(&mut self, input: &CanvasInput) -> bool {
        let mut effects = Vec::new();
        let repaint =
            self.controller
                .handle_input(input, &mut self.scene, &mut self.viewport, &mut effects);
        let resolved = !effects.is_empty();
        self.resolve(effects);
        repaint || resolved
    }

    /// Fold one server event into the scene. Returns true if anything changed.
    pub fn apply_event(&mut self, event: &CanvasEvent) -> bool {
        let applied = self.reconciler.apply(&mut self.scene, event);
        if let Applied::Completed(task_id) = &applied {
            if let Some(node) = self.scene.node(task_id) {
                self.clock.burst(node.rect().center());
            }
        }
        self.controller.prune(&self.scene);
        applied.changed()
    }

    /// Advance animations. Returns true while something is animating.
    pub fn tick(&mut self, dt: f32) -> bool {
        let particles = self.clock.tick(dt);
        let pulsing = self
            .scene
            .nodes()
            .iter()
            .filter_map(|n| n.as_task())
            .any(|t| t.status == TaskStatus::InProgress);
        particles || pulsing
    }

    /// Levelled layout of all tasks; returns the number placed
    pub fn auto_layout(&mut self) -> usize {
        self.layout.apply(
            &mut self.scene,
            &self.viewport,
            self.controller.screen_size(),
        )
    }

    /// Every stored position plus the viewport
    pub fn persisted_layout(&self) -> PersistedLayout {
        PersistedLayout {
            workspace_id: self.workspace_id.clone(),
            positions: self.scene.stored_positions(),
            viewport: Some(self.viewport.to_saved()),
        }
    }

    /// Queue a `save_layout` request
    pub fn save_layout(&mut self) {
        let layout = self.persisted_layout();
        self.effects
            .push(Effect::Request(CanvasIntent::SaveLayout(layout)));
    }

    /// Take everything produced since the last drain
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn resolve(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistLayout => self.save_layout(),
                Effect::AutoLayout => {
                    self.auto_layout();
                    self.save_layout();
                }
                other => self.effects.push(other),
            }
        }
    }
}
