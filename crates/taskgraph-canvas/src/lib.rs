//! Taskgraph canvas engine
//!
//! This crate holds the scene engine only: no transport, no async, no
//! rendering backend. Embedders feed it inputs and server events and act on
//! the effects it returns; `taskgraph-live` does that over HTTP.

pub mod canvas;
pub mod config;

pub use canvas::{
    Applied,
    // Engine facade
    CanvasEngine,
    CanvasInput,
    Connection,
    ConnectionError,
    Effect,
    EventReconciler,
    InteractionController,
    InteractionState,
    Key,
    LayoutEngine,
    NodeKind,
    PointerButton,
    SceneModel,
    Viewport,
};
pub use config::{global_config, CanvasSettings};
