//! Worker pool for a single pipeline stage

use super::PipelineResult;
use std::any::Any;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinError;

/// Name and worker count of one stage
#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Used in log fields only
    pub name: Arc<str>,

    /// Parallel workers; also the capacity of the stage's output channel
    pub workers: usize,
}

impl StageOptions {
    pub fn new(name: impl Into<Arc<str>>, workers: usize) -> Self {
        Self {
            name: name.into(),
            workers: workers.max(1),
        }
    }
}

/// A stage function that panicked instead of returning a result
///
/// Pipelines convert it into their error type, so the item still produces
/// exactly one result and the worker keeps serving the rest of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePanic {
    pub stage: Arc<str>,
    pub message: String,
}

impl StagePanic {
    pub fn from_join_error(stage: impl Into<Arc<str>>, err: JoinError) -> Self {
        let message = if err.is_panic() {
            panic_message(err.into_panic())
        } else {
            err.to_string()
        };

        Self {
            stage: stage.into(),
            message,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "non-string panic payload".to_string()),
    }
}

impl Display for StagePanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage '{}' panicked: {}", self.stage, self.message)
    }
}

impl std::error::Error for StagePanic {}

impl From<StagePanic> for String {
    fn from(panic: StagePanic) -> Self {
        panic.to_string()
    }
}

pub(super) fn spawn_stage<I, O, E, F, Fut>(
    options: StageOptions,
    input: mpsc::Receiver<PipelineResult<I, E>>,
    process: F,
) -> mpsc::Receiver<PipelineResult<O, E>>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Display + From<StagePanic> + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PipelineResult<O, E>> + Send + 'static,
{
    let workers = options.workers.max(1);
    let (tx, rx) = mpsc::channel(workers);
    let input = Arc::new(Mutex::new(input));
    let process = Arc::new(process);

    for worker in 0..workers {
        let input = Arc::clone(&input);
        let process = Arc::clone(&process);
        let tx = tx.clone();
        let name = Arc::clone(&options.name);

        tokio::spawn(async move {
            loop {
                // The lock is held only while waiting for the next item
                let next = input.lock().await.recv().await;
                let Some(item) = next else {
                    break;
                };

                let result = match item {
                    Err(err) => Err(err),
                    Ok(value) => {
                        let start = Instant::now();
                        // Own task per item, so a panic surfaces as a JoinError
                        let result = match tokio::spawn(process(value)).await {
                            Ok(result) => result,
                            Err(err) => {
                                let panic = StagePanic::from_join_error(Arc::clone(&name), err);
                                tracing::error!(stage = %name, worker, error = %panic, "stage function failed");
                                Err(E::from(panic))
                            }
                        };
                        match &result {
                            Ok(_) => tracing::debug!(
                                stage = %name,
                                worker,
                                elapsed_ms = start.elapsed().as_millis() as u64,
                                "processed item"
                            ),
                            Err(err) => tracing::debug!(
                                stage = %name,
                                worker,
                                error = %err,
                                "unable to process item"
                            ),
                        }
                        result
                    }
                };

                if tx.send(result).await.is_err() {
                    tracing::debug!(stage = %name, worker, "downstream closed");
                    break;
                }
            }

            tracing::trace!(stage = %name, worker, "worker exiting");
        });
    }

    rx
}
