//! Canvas runtime - single-queue event loop
//!
//! Input from the embedder and events from the stream supervisor share one
//! queue, so they reach the engine in arrival order and each turn finishes
//! before the next begins. Animation ticks run between turns.
//!
//! After every turn the engine's effects are routed:
//! - `Request` goes to the [`IntentDispatcher`]
//! - `Notice` goes to the dispatcher's [`Notifier`](crate::Notifier)
//! - `ShowTaskDetails` / `ShowTaskLog` go to the panel channel, if any

use std::time::Duration;

use taskgraph_canvas::{CanvasEngine, CanvasInput, Effect};
use taskgraph_types::CanvasEvent;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::dispatch::IntentDispatcher;

const MIN_FRAME: Duration = Duration::from_millis(1);

/// One unit of work for the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    Input(CanvasInput),
    Event(CanvasEvent),
}

impl From<CanvasInput> for Turn {
    fn from(input: CanvasInput) -> Self {
        Turn::Input(input)
    }
}

impl From<CanvasEvent> for Turn {
    fn from(event: CanvasEvent) -> Self {
        Turn::Event(event)
    }
}

pub struct CanvasRuntime {
    engine: CanvasEngine,
    dispatcher: IntentDispatcher,
    panels: Option<mpsc::UnboundedSender<Effect>>,
}

impl CanvasRuntime {
    pub fn new(engine: CanvasEngine, dispatcher: IntentDispatcher) -> Self {
        Self {
            engine,
            dispatcher,
            panels: None,
        }
    }

    /// Forward panel effects (task details, task log) to the embedder
    pub fn with_panels(mut self, panels: mpsc::UnboundedSender<Effect>) -> Self {
        self.panels = Some(panels);
        self
    }

    pub fn engine(&self) -> &CanvasEngine {
        &self.engine
    }

    pub fn into_engine(self) -> CanvasEngine {
        self.engine
    }

    /// Run one turn to completion. Returns true if the canvas needs a repaint.
    pub fn step(&mut self, turn: Turn) -> bool {
        let repaint = match &turn {
            Turn::Input(input) => self.engine.handle_input(input),
            Turn::Event(event) => self.engine.apply_event(event),
        };
        self.flush();
        repaint
    }

    fn flush(&mut self) {
        for effect in self.engine.drain_effects() {
            match effect {
                Effect::Request(intent) => {
                    tracing::debug!(op = intent.op(), "Dispatching intent");
                    self.dispatcher.dispatch(intent);
                }
                Effect::Notice(message) => self.dispatcher.notifier().notify(&message),
                panel => {
                    let delivered = self.panels.as_ref().map(|tx| tx.send(panel).is_ok());
                    if delivered == Some(false) {
                        tracing::debug!("Panel receiver dropped");
                        self.panels = None;
                    }
                }
            }
        }
    }

    /// Drain `queue` until every sender is gone, ticking animations every
    /// `frame` (at least 1ms). `present` is called whenever the canvas needs
    /// a repaint. Returns the engine.
    pub async fn run<F>(
        mut self,
        mut queue: mpsc::Receiver<Turn>,
        frame: Duration,
        mut present: F,
    ) -> CanvasEngine
    where
        F: FnMut(&CanvasEngine),
    {
        // interval() panics on a zero period
        let frame = frame.max(MIN_FRAME);
        let mut ticker = tokio::time::interval(frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            workspace_id = %self.engine.workspace_id(),
            "Canvas runtime started"
        );

        loop {
            let repaint = tokio::select! {
                biased;
                turn = queue.recv() => match turn {
                    Some(turn) => self.step(turn),
                    None => break,
                },
                _ = ticker.tick() => self.engine.tick(frame.as_secs_f32()),
            };
            if repaint {
                present(&self.engine);
            }
        }

        tracing::info!(
            workspace_id = %self.engine.workspace_id(),
            "Canvas queue closed, runtime stopped"
        );
        self.engine
    }
}
