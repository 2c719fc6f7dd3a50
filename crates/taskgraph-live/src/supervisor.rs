//! Stream supervisor - keeps the inbound event stream alive
//!
//! Opens the [`EventSource`], forwards every decoded event into the runtime
//! queue and, when the stream errors or ends, waits a fixed delay and opens
//! it again. Retries are unbounded. After a reconnect a fresh snapshot is
//! fetched and forwarded first so the scene catches up on anything missed
//! while disconnected.
//!
//! The supervisor stops only when the receiving side of the queue is gone.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use taskgraph_canvas::config::StreamSettings;
use taskgraph_types::{CanvasEvent, WorkspaceSnapshot};
use tokio::sync::mpsc;

use crate::error::StreamError;

/// Decoded events from one connection
pub type EventStream = BoxStream<'static, Result<CanvasEvent, StreamError>>;

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open a new connection to the event stream
    async fn open(&self) -> Result<EventStream, StreamError>;

    /// Fetch the current workspace state
    async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, StreamError>;
}

/// How a connection ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Server closed the stream
    StreamEnded,
    /// Nobody is listening anymore
    ReceiverGone,
}

pub struct StreamSupervisor<S> {
    source: S,
    reconnect_delay: Duration,
}

impl<S: EventSource> StreamSupervisor<S> {
    pub fn new(source: S, settings: &StreamSettings) -> Self {
        Self {
            source,
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Forward events into `tx` until it closes.
    ///
    /// `T` is whatever the queue carries; the runtime's [`Turn`](crate::Turn)
    /// converts from [`CanvasEvent`].
    pub async fn run<T>(&self, tx: mpsc::Sender<T>) -> Result<()>
    where
        T: From<CanvasEvent> + Send,
    {
        let mut reconnects: u64 = 0;

        loop {
            match self.run_session(&tx, reconnects > 0).await {
                Ok(SessionEnd::ReceiverGone) => {
                    tracing::info!("Event queue closed, stopping stream supervisor");
                    return Ok(());
                }
                Ok(SessionEnd::StreamEnded) => {
                    tracing::warn!(
                        reconnects,
                        delay_ms = self.reconnect_delay.as_millis() as u64,
                        "Event stream ended, reconnecting"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        reconnects,
                        delay_ms = self.reconnect_delay.as_millis() as u64,
                        error = %e,
                        "Event stream error, reconnecting"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = tx.closed() => {
                    tracing::info!("Event queue closed, stopping stream supervisor");
                    return Ok(());
                }
            }
            reconnects += 1;
        }
    }

    /// One connection: open, optionally resync, then forward until it ends
    async fn run_session<T>(&self, tx: &mpsc::Sender<T>, resync: bool) -> Result<SessionEnd>
    where
        T: From<CanvasEvent> + Send,
    {
        let mut stream = self
            .source
            .open()
            .await
            .context("Failed to open event stream")?;
        tracing::info!(resync, "Event stream connected");

        if resync {
            let snapshot = self
                .source
                .fetch_snapshot()
                .await
                .context("Failed to fetch snapshot after reconnect")?;
            tracing::info!(
                tasks = snapshot.tasks.len(),
                agents = snapshot.agents.len(),
                "Snapshot fetched after reconnect"
            );
            if tx.send(CanvasEvent::Initial(snapshot).into()).await.is_err() {
                return Ok(SessionEnd::ReceiverGone);
            }
        }

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    tracing::debug!(event = event.event_type(), "Event received");
                    if tx.send(event.into()).await.is_err() {
                        return Ok(SessionEnd::ReceiverGone);
                    }
                }
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(error = %e, "Skipping undecodable event");
                }
                Err(e) => return Err(e).context("Event stream error"),
            }
        }
        Ok(SessionEnd::StreamEnded)
    }
}

impl<S: EventSource + 'static> StreamSupervisor<S> {
    /// Run on its own task
    pub fn spawn<T>(self, tx: mpsc::Sender<T>) -> tokio::task::JoinHandle<Result<()>>
    where
        T: From<CanvasEvent> + Send + 'static,
    {
        tokio::spawn(async move { self.run(tx).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use taskgraph_types::{EventDecodeError, TaskSnapshot, TaskStartedData};
    use tokio::time::Instant;

    /// What one `open()` call yields
    enum Session {
        Refused,
        Events(Vec<Result<CanvasEvent, StreamError>>),
        /// Yields the events, then never ends
        Hang(Vec<CanvasEvent>),
    }

    #[derive(Clone, Default)]
    struct ScriptedSource {
        sessions: Arc<Mutex<VecDeque<Session>>>,
        opened_at: Arc<Mutex<Vec<Instant>>>,
        snapshots: Arc<Mutex<usize>>,
    }

    impl ScriptedSource {
        fn new(sessions: Vec<Session>) -> Self {
            Self {
                sessions: Arc::new(Mutex::new(sessions.into())),
                ..Self::default()
            }
        }

        fn opened_at(&self) -> Vec<Instant> {
            self.opened_at.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn open(&self) -> Result<EventStream, StreamError> {
            self.opened_at.lock().unwrap().push(Instant::now());
            let session = self.sessions.lock().unwrap().pop_front();
            match session {
                None => Ok(stream::pending().boxed()),
                Some(Session::Refused) => Err(StreamError::Unavailable("refused".into())),
                Some(Session::Events(events)) => Ok(stream::iter(events).boxed()),
                Some(Session::Hang(events)) => Ok(stream::iter(events.into_iter().map(Ok::<_, StreamError>))
                    .chain(stream::pending())
                    .boxed()),
            }
        }

        async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, StreamError> {
            *self.snapshots.lock().unwrap() += 1;
            Ok(WorkspaceSnapshot {
                tasks: vec![TaskSnapshot::new("t1", "resynced")],
                ..WorkspaceSnapshot::default()
            })
        }
    }

    fn started(id: &str) -> CanvasEvent {
        CanvasEvent::TaskStarted(TaskStartedData {
            task_id: id.into(),
            timestamp: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_reconnects() {
        let source = ScriptedSource::new(vec![
            Session::Events(vec![Ok(started("t1"))]),
            Session::Refused,
            Session::Hang(vec![started("t2")]),
        ]);
        let supervisor = StreamSupervisor::new(source.clone(), &StreamSettings::default());
        let (tx, mut rx) = mpsc::channel::<CanvasEvent>(16);
        let handle = supervisor.spawn(tx);

        assert_eq!(rx.recv().await.unwrap().task_id(), Some("t1"));
        // Reconnect resyncs before new events
        assert!(matches!(rx.recv().await, Some(CanvasEvent::Initial(_))));
        assert_eq!(rx.recv().await.unwrap().task_id(), Some("t2"));

        let opened = source.opened_at();
        assert_eq!(opened.len(), 3);
        assert_eq!(opened[1] - opened[0], Duration::from_millis(5000));
        assert_eq!(opened[2] - opened[1], Duration::from_millis(5000));
        assert_eq!(*source.snapshots.lock().unwrap(), 1);

        drop(rx);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_does_not_drop_connection() {
        let bad = StreamError::Decode(EventDecodeError::MalformedEnvelope(
            serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        ));
        let source = ScriptedSource::new(vec![Session::Events(vec![
            Err(bad),
            Ok(started("t1")),
        ])]);
        let supervisor = StreamSupervisor::new(source.clone(), &StreamSettings::default());
        let (tx, mut rx) = mpsc::channel::<CanvasEvent>(16);
        let handle = supervisor.spawn(tx);

        assert_eq!(rx.recv().await.unwrap().task_id(), Some("t1"));
        assert_eq!(source.opened_at().len(), 1);
        drop(rx);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_queue_closes() {
        let source = ScriptedSource::new(vec![Session::Refused, Session::Refused]);
        let supervisor = StreamSupervisor::new(source.clone(), &StreamSettings::default());
        let (tx, rx) = mpsc::channel::<CanvasEvent>(1);
        drop(rx);
        supervisor.run(tx).await.unwrap();
        assert_eq!(source.opened_at().len(), 1);
    }
}
