//! Live wiring for the taskgraph canvas
//!
//! Connects a [`CanvasEngine`](taskgraph_canvas::CanvasEngine) to the
//! orchestration backend.
//!
//! ```text
//! backend ──SSE──► EventSource ──► StreamSupervisor ──┐
//!                                 (fixed-delay retry)  │ Turn::Event
//!                                                      ▼
//! embedder ────────────── Turn::Input ──────────► CanvasRuntime ──► CanvasEngine
//!                                                      │
//!                                                      ▼ CanvasIntent
//!                                              IntentDispatcher ──► ApiClient
//!                                                      │ (failure)
//!                                                      ▼
//!                                                   Notifier
//! ```
//!
//! Everything reaching the engine goes through one queue, so every handler
//! runs to completion before the next input or event is looked at.

pub mod dispatch;
pub mod error;
pub mod http;
pub mod runtime;
pub mod sse;
pub mod supervisor;

pub use dispatch::{ApiClient, IntentDispatcher, Notifier, TracingNotifier};
pub use error::{ApiError, StreamError};
pub use http::{HttpApiClient, HttpEventSource};
pub use runtime::{CanvasRuntime, Turn};
pub use sse::{SseDecoder, SseFrame};
pub use supervisor::{EventSource, EventStream, StreamSupervisor};
