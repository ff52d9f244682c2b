//! Concurrency-bounded task execution with positional results.
//!
//! The primitive the runner drives once per wave: run an ordered batch of
//! independent async tasks with at most N in flight, and hand back results
//! in input order no matter how completion interleaves.

use crate::errors::ConfigError;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::num::NonZeroUsize;

/// Ceiling on how many tasks may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyLimit {
    /// At most this many tasks run concurrently.
    Bounded(NonZeroUsize),
    /// Every task starts immediately.
    #[default]
    Unbounded,
}

impl ConcurrencyLimit {
    /// Builds a bounded limit, rejecting a non-positive ceiling.
    pub fn bounded(limit: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(limit)
            .map(Self::Bounded)
            .ok_or_else(|| ConfigError::new("concurrency limit must be a positive integer"))
    }

    /// Number of tasks to keep in flight for a batch of `task_count`.
    #[must_use]
    pub fn window(self, task_count: usize) -> usize {
        match self {
            Self::Bounded(limit) => limit.get().min(task_count),
            Self::Unbounded => task_count,
        }
    }
}

/// Runs `tasks` under `limit`, returning results in input order.
///
/// `results[i]` is `tasks[i]`'s value regardless of completion order. The
/// in-flight window slides one task per completion rather than draining
/// fixed-size chunks, so one slow task never idles the rest of the budget.
///
/// Every launched task settles before this returns; if any task fails, the
/// failure propagated is the first by input position. Whether siblings
/// should have been cancelled is the caller's policy, not this primitive's.
pub async fn execute_with_concurrency<F, T, E>(
    tasks: Vec<F>,
    limit: ConcurrencyLimit,
) -> Result<Vec<T>, E>
where
    F: Future<Output = Result<T, E>>,
{
    let total = tasks.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut pending = tasks.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();
    for (index, task) in pending.by_ref().take(limit.window(total)) {
        in_flight.push(Box::pin(async move { (index, task.await) })
            as std::pin::Pin<Box<dyn Future<Output = (usize, Result<T, E>)>>>);
    }

    let mut settled = Vec::with_capacity(total);
    while let Some(outcome) = in_flight.next().await {
        settled.push(outcome);
        if let Some((index, task)) = pending.next() {
            in_flight.push(Box::pin(async move { (index, task.await) })
                as std::pin::Pin<Box<dyn Future<Output = (usize, Result<T, E>)>>>);
        }
    }

    settled.sort_unstable_by_key(|(index, _)| *index);
    let mut results = Vec::with_capacity(total);
    for (_, result) in settled {
        results.push(result?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order_not_completion_order() {
        let tasks: Vec<_> = [100u64, 50, 10]
            .into_iter()
            .enumerate()
            .map(|(index, delay_ms)| async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok::<usize, String>(index)
            })
            .collect();

        let results = execute_with_concurrency(tasks, ConcurrencyLimit::bounded(3).unwrap())
            .await
            .unwrap();
        assert_eq!(results, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..20)
            .map(|index| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<usize, String>(index)
                }
            })
            .collect();

        let results = execute_with_concurrency(tasks, ConcurrencyLimit::bounded(3).unwrap())
            .await
            .unwrap();

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_unbounded_starts_everything_at_once() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|index| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<usize, String>(index)
                }
            })
            .collect();

        execute_with_concurrency(tasks, ConcurrencyLimit::Unbounded)
            .await
            .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_empty_input_yields_empty_results() {
        let tasks: Vec<std::future::Ready<Result<usize, String>>> = Vec::new();
        let results =
            tokio_test::block_on(execute_with_concurrency(tasks, ConcurrencyLimit::Unbounded))
                .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_limit_larger_than_batch_behaves_like_unbounded() {
        let tasks: Vec<_> = (0..4)
            .map(|index| async move { Ok::<usize, String>(index * 2) })
            .collect();

        let results = execute_with_concurrency(tasks, ConcurrencyLimit::bounded(64).unwrap())
            .await
            .unwrap();
        assert_eq!(results, vec![0, 2, 4, 6]);
    }

    #[tokio::test]
    async fn test_first_failure_by_position_wins() {
        // The positionally later failure completes first; the earlier one
        // must still be the one reported.
        let tasks: Vec<_> = vec![
            task(30, Ok(0)),
            task(20, Err("second".to_string())),
            task(5, Err("third".to_string())),
        ];

        let err = execute_with_concurrency(tasks, ConcurrencyLimit::Unbounded)
            .await
            .unwrap_err();
        assert_eq!(err, "second");
    }

    #[tokio::test]
    async fn test_all_tasks_settle_even_after_a_failure() {
        let completed = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..6)
            .map(|index| {
                let completed = Arc::clone(&completed);
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    if index == 2 {
                        Err("boom".to_string())
                    } else {
                        Ok(index)
                    }
                }
            })
            .collect();

        let err = execute_with_concurrency(tasks, ConcurrencyLimit::bounded(2).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
        assert_eq!(completed.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert!(ConcurrencyLimit::bounded(0).is_err());
        assert!(ConcurrencyLimit::bounded(1).is_ok());
    }

    #[test]
    fn test_limit_serde_round_trip() {
        let bounded = ConcurrencyLimit::bounded(4).unwrap();
        let encoded = serde_json::to_string(&bounded).unwrap();
        let decoded: ConcurrencyLimit = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, bounded);

        let decoded: ConcurrencyLimit = serde_json::from_str("\"unbounded\"").unwrap();
        assert_eq!(decoded, ConcurrencyLimit::Unbounded);
    }

    async fn task(delay_ms: u64, outcome: Result<usize, String>) -> Result<usize, String> {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        outcome
    }
}
