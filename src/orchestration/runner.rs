//! # Task Runner
//!
//! The capability set the pipeline needs from an orchestrator: submit a unit of work,
//! await its result, and apply a retry policy to it. [`LocalTaskRunner`] implements
//! it on the tokio runtime of the current process. Work is submitted as a closure
//! that produces a fresh future per attempt, so a retried task starts from scratch.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

use super::backoff::RetryPolicy;
use crate::error::{EtlError, EtlResult};
use crate::logging::duration_ms;

pub trait TaskRunner: Send + Sync {
    /// Start `work` and return a handle to its eventual result.
    fn submit<T, F, Fut>(&self, name: impl Into<String>, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EtlResult<T>> + Send + 'static;

    fn retry_policy(&self) -> &RetryPolicy;
}

/// Handle to a submitted task
#[derive(Debug)]
pub struct TaskHandle<T> {
    name: String,
    inner: JoinHandle<EtlResult<T>>,
}

impl<T> TaskHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the task, including all of its retries, to finish.
    pub async fn wait(self) -> EtlResult<T> {
        self.inner.await?
    }
}

/// In-process runner: one tokio task per submission, a semaphore bounding how many
/// attempts run at once.
#[derive(Debug, Clone)]
pub struct LocalTaskRunner {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    retry_policy: RetryPolicy,
}

impl LocalTaskRunner {
    pub fn new(max_concurrency: usize, retry_policy: RetryPolicy) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            retry_policy,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

impl TaskRunner for LocalTaskRunner {
    fn submit<T, F, Fut>(&self, name: impl Into<String>, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EtlResult<T>> + Send + 'static,
    {
        let name = name.into();
        let permits = Arc::clone(&self.permits);
        let policy = self.retry_policy.clone();
        let span = info_span!("task", task = %name);

        let inner = tokio::spawn(
            async move { run_with_retry(&permits, &policy, work).await }.instrument(span),
        );

        TaskHandle { name, inner }
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

async fn run_with_retry<T, F, Fut>(
    permits: &Semaphore,
    policy: &RetryPolicy,
    work: F,
) -> EtlResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = EtlResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let result = {
            // the permit is released while backing off
            let _permit = permits
                .acquire()
                .await
                .map_err(|_| EtlError::TaskAborted("task runner shut down".to_string()))?;
            work().await
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Task succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && policy.should_retry(attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = duration_ms(delay),
                    error = %err,
                    "Task failed with a retryable error; backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
