//! Generic staged pipeline executor
//!
//! A [`Pipeline`] is a finite stream of [`PipelineResult`]s flowing through
//! stages. Each stage runs a pool of tokio workers that pull from the
//! previous stage's bounded channel, apply a processing function, and push
//! the outcome into their own bounded channel (capacity = worker count), so a
//! saturated consumer naturally throttles upstream stages.
//!
//! Errors short-circuit: an `Err` arriving at a stage is forwarded untouched
//! and never reaches that stage's processing function. A processing function
//! that panics yields an error built from [`StagePanic`] for that item only.
//! Outputs carry no ordering guarantee relative to inputs.
//!
//! # Example
//!
//! ```
//! use strand_crawler::pipeline::{Pipeline, StageOptions};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let results = Pipeline::<u32, String>::from_items(vec![1, 2, 3])
//!     .stage(StageOptions::new("double", 2), |n| async move { Ok(n * 2) })
//!     .stage(StageOptions::new("check", 2), |n| async move {
//!         if n == 4 { Err("four".to_string()) } else { Ok(n) }
//!     })
//!     .collect()
//!     .await;
//!
//! assert_eq!(results.len(), 3);
//! assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
//! # }
//! ```

mod stage;

pub use stage::{StageOptions, StagePanic};

use std::fmt::Display;
use std::future::Future;
use tokio::sync::mpsc;

/// Either a successfully produced item or the error that ended its journey
pub type PipelineResult<T, E> = Result<T, E>;

/// A finite, draining stream of pipeline results
///
/// Every constructor and [`Pipeline::stage`] spawns tokio tasks, so they must
/// be called from within a runtime.
pub struct Pipeline<T, E> {
    output: mpsc::Receiver<PipelineResult<T, E>>,
}

impl<T, E> Pipeline<T, E>
where
    T: Send + 'static,
    E: Display + Send + 'static,
{
    /// Creates a pipeline source from an ordered, finite sequence of items
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = items.into_iter().collect();
        let (tx, rx) = mpsc::channel(items.len().max(1));

        tokio::spawn(async move {
            for item in items {
                if tx.send(Ok(item)).await.is_err() {
                    break;
                }
            }
        });

        Self { output: rx }
    }

    /// Appends a stage with `options.workers` parallel workers
    ///
    /// The stage's output closes once its input is exhausted and every worker
    /// has exited.
    pub fn stage<O, F, Fut>(self, options: StageOptions, process: F) -> Pipeline<O, E>
    where
        E: From<StagePanic>,
        O: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PipelineResult<O, E>> + Send + 'static,
    {
        Pipeline {
            output: stage::spawn_stage(options, self.output, process),
        }
    }

    /// Receives the next finished result, or `None` once the pipeline has drained
    pub async fn next(&mut self) -> Option<PipelineResult<T, E>> {
        self.output.recv().await
    }

    /// Drains the pipeline to completion
    pub async fn collect(mut self) -> Vec<PipelineResult<T, E>> {
        let mut results = Vec::new();
        while let Some(result) = self.output.recv().await {
            results.push(result);
        }
        results
    }
}
