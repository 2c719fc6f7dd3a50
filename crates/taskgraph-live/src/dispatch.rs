//! Intent dispatch
//!
//! Fire-and-forget: each intent is sent on its own task. A failure is
//! reported through the [`Notifier`] and never retried; the next snapshot
//! from the server is what corrects an optimistic local edit.

use std::sync::Arc;

use async_trait::async_trait;
use taskgraph_types::CanvasIntent;
use tokio::task::JoinHandle;

use crate::error::ApiError;

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn send(&self, intent: &CanvasIntent) -> Result<(), ApiError>;
}

/// User-facing messages (failed requests, form validation)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(notice = message, "Canvas notice");
    }
}

#[derive(Clone)]
pub struct IntentDispatcher {
    client: Arc<dyn ApiClient>,
    notifier: Arc<dyn Notifier>,
}

impl IntentDispatcher {
    pub fn new(client: Arc<dyn ApiClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Send one intent on its own task
    pub fn dispatch(&self, intent: CanvasIntent) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let op = intent.op();
            match client.send(&intent).await {
                Ok(()) => tracing::debug!(op, "Intent sent"),
                Err(e) => {
                    tracing::warn!(op, error = %e, "Intent failed");
                    notifier.notify(&format!("{} failed: {}", op, e));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FlakyClient {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ApiClient for FlakyClient {
        async fn send(&self, intent: &CanvasIntent) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(intent.op());
            match intent {
                CanvasIntent::DeleteTask { .. } => Err(ApiError::Rejected {
                    op: intent.op(),
                    status: 404,
                    body: "no such task".into(),
                }),
                _ => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct Collected(Mutex<Vec<String>>);

    impl Notifier for Collected {
        fn notify(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[tokio::test]
    async fn test_failure_is_notified_once() {
        let client = Arc::new(FlakyClient::default());
        let notes = Arc::new(Collected::default());
        let dispatcher = IntentDispatcher::new(client.clone(), notes.clone());

        dispatcher
            .dispatch(CanvasIntent::DeleteTask {
                task_id: "t1".into(),
            })
            .await
            .unwrap();
        dispatcher
            .dispatch(CanvasIntent::ExecuteTask {
                task_id: "t2".into(),
                rerun: false,
            })
            .await
            .unwrap();

        assert_eq!(
            *client.calls.lock().unwrap(),
            vec!["delete_task", "execute_task"]
        );
        assert_eq!(
            *notes.0.lock().unwrap(),
            vec!["delete_task failed: Server rejected 'delete_task' with 404: no such task".to_string()]
        );
    }
}
