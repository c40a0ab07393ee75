//! Producer/consumer task group
//!
//! Every task of a group receives the same [`CancellationToken`]. A task
//! that fails or panics cancels the token, so its siblings wind down
//! instead of waiting on a peer that will never make progress. Ending with
//! [`Error::Cancelled`] or [`Error::ChannelClosed`] counts as success.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Named tasks sharing one cancellation token
#[derive(Debug)]
pub struct TaskGroup {
    cancel: CancellationToken,
    tasks: Vec<(String, JoinHandle<Result<()>>)>,
    first_failure: Arc<Mutex<Option<Error>>>,
}

impl TaskGroup {
    /// Create a group with a fresh token
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Create a group driven by an existing token
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            tasks: Vec::new(),
            first_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// The group's cancellation token
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every task of the group
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Number of spawned tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if no task was spawned
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawn a task; `f` receives the group token
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let fut = f(self.cancel.clone());
        let task_name = name.clone();
        let cancel = self.cancel.clone();
        let first_failure = Arc::clone(&self.first_failure);

        let handle = tokio::spawn(async move {
            // Cancels siblings on failure and when unwinding from a panic
            let guard = cancel.drop_guard();
            let result = fut.await;

            match &result {
                Err(e) if !e.is_normal_termination() => {
                    tracing::error!(task = %task_name, error = %e, "Task failed, cancelling siblings");
                    first_failure.lock().get_or_insert_with(|| Error::Task {
                        name: task_name.clone(),
                        message: e.to_string(),
                    });
                    drop(guard);
                }
                _ => {
                    tracing::debug!(task = %task_name, "Task finished");
                    guard.disarm();
                }
            }
            result
        });

        tracing::debug!(task = %name, "Task spawned");
        self.tasks.push((name, handle));
    }

    /// Wait for every task
    ///
    /// Returns the first failure as [`Error::Task`]. Tasks that ended with a
    /// normal termination do not count as failures.
    pub async fn join_all(self) -> Result<()> {
        let mut panicked = None;

        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                tracing::error!(task = %name, error = %e, "Task panicked");
                self.cancel.cancel();
                panicked.get_or_insert(Error::Task {
                    name,
                    message: e.to_string(),
                });
            }
        }

        let failure = self.first_failure.lock().take();
        match failure.or(panicked) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}
