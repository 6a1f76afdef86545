// src/limiter.rs
// Bounded fan-out/fan-in for one stage: at most `max_concurrency` operations
// in flight, every operation settles (success or failure) without cancelling
// siblings, and nothing outlives the stage deadline.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::StageError;

/// Run `ops` (subject key + future) under the given concurrency bound and
/// stage timeout. Returns one settled result per input key; operations still
/// in flight at the deadline are aborted and reported as `Timeout`.
/// Completion order is not guaranteed.
pub async fn run_bounded<T, F>(
    max_concurrency: usize,
    stage_timeout: Duration,
    ops: Vec<(String, F)>,
) -> Vec<(String, Result<T, StageError>)>
where
    F: Future<Output = Result<T, StageError>> + Send + 'static,
    T: Send + 'static,
{
    let keys: Vec<String> = ops.iter().map(|(k, _)| k.clone()).collect();
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut set = JoinSet::new();

    for (key, fut) in ops {
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return (key, Err(StageError::Task("limiter closed".into()))),
            };
            let out = fut.await;
            (key, out)
        });
    }

    let deadline = tokio::time::Instant::now() + stage_timeout;
    let mut results: Vec<(String, Result<T, StageError>)> = Vec::with_capacity(keys.len());

    loop {
        tokio::select! {
            joined = set.join_next() => {
                match joined {
                    None => break,
                    Some(Ok(entry)) => results.push(entry),
                    Some(Err(e)) => {
                        // A panicked task loses its key; settle it generically
                        // rather than poisoning the stage.
                        results.push(("task".to_string(), Err(StageError::Task(e.to_string()))));
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                set.abort_all();
                while set.join_next().await.is_some() {}
                let done: HashSet<String> =
                    results.iter().map(|(k, _)| k.clone()).collect();
                for key in &keys {
                    if !done.contains(key.as_str()) {
                        results.push((key.clone(), Err(StageError::Timeout)));
                    }
                }
                break;
            }
        }
    }

    results
}
