//! Shared wire types for the taskgraph canvas
//!
//! This crate holds every type that crosses the boundary between the
//! orchestration backend and the canvas engine.
//!
//! ## Boundaries
//!
//! ```text
//! ┌──────────────────┐  events (SSE)   ┌──────────────────┐
//! │  Orchestrator    │ ──────────────► │  Canvas engine   │
//! │  backend         │ ◄────────────── │  (scene + input) │
//! └──────────────────┘  intents (JSON) └──────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. Pure data - no egui, no scene state, no async
//! 2. Positions travel as optional `x` / `y` pairs; `None` means "not placed"
//! 3. Node ids are plain strings and share one namespace across agents,
//!    tasks and combiners

pub mod event;
pub mod intent;
pub mod layout;
pub mod snapshot;

pub use event::{
    CanvasEvent, EventDecodeError, ProgressUpdate, TaskCompletedData, TaskFailedData,
    TaskStartedData, ThinkingData, ToolCallData, ToolResultData,
};
pub use intent::{CanvasIntent, CombinerMode, TaskPatch};
pub use layout::{PersistedLayout, SavedPosition, SavedViewport};
pub use snapshot::{
    AgentSnapshot, AgentStatus, CombinerSnapshot, CombinerStatus, ConnectionSnapshot,
    TaskSnapshot, TaskStatus, WorkspaceProgress, WorkspaceSnapshot,
};

/// Identifier shared by agents, tasks and combiners.
pub type NodeId = String;
