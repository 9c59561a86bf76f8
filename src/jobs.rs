// src/jobs.rs
//
// Generic bounded worker pool. Jobs are opaque to the runner: each is handed
// to the caller's async function, which reports success (`Ok(true)`), a
// recoverable failure (`Ok(false)`), or a fatal error (`Err`). The runner
// streams one progress snapshot per observed result, after an initial
// all-zero snapshot, until every job is accounted for.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::errors::{EvalError, Result};

/// A snapshot of batch execution state. `complete` and `errors` are
/// monotonically non-decreasing across a stream and `complete + errors`
/// never exceeds `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub complete: usize,
    pub total: usize,
    pub errors: usize,
}

/// Runs a list of jobs with a fixed number of concurrent workers.
pub struct JobRunner {
    concurrency: usize,
}

impl JobRunner {
    /// Creates a runner with the given worker count. A zero worker count is a
    /// configuration error, rejected here rather than when `run` is called.
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency < 1 {
            return Err(EvalError::Config("concurrency must be >= 1".to_string()));
        }
        Ok(Self { concurrency })
    }

    /// Runs `jobs` through `run_job` and returns the progress stream.
    ///
    /// All jobs go onto a shared FIFO queue and `min(concurrency, jobs)`
    /// workers are spawned. Each worker pops jobs non-blockingly, so it exits
    /// as soon as the queue is empty, and pushes each outcome onto a results
    /// channel. The stream is the sole consumer of that channel: it emits the
    /// initial `{0, total, 0}` snapshot before any result is read, then one
    /// updated snapshot per result, and ends once `complete + errors ==
    /// total`. An `Err` outcome is yielded through the stream and terminates
    /// it; workers already mid-job run to completion but their results are
    /// discarded.
    ///
    /// Dropping the stream early is the only cancellation mechanism: workers
    /// notice the closed channel on their next send and stop dequeuing.
    pub fn run<J, F, Fut>(
        self,
        jobs: Vec<J>,
        run_job: F,
    ) -> impl Stream<Item = Result<Progress>>
    where
        J: Send + 'static,
        F: Fn(J) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        let total = jobs.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
        // Bounded hand-off: workers park here only if the consumer lags a
        // full round behind.
        let (tx, rx) = mpsc::channel::<Result<bool>>(self.concurrency);

        for _ in 0..self.concurrency.min(total) {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let run_job = run_job.clone();
            tokio::spawn(async move {
                loop {
                    let job = queue.lock().ok().and_then(|mut q| q.pop_front());
                    let Some(job) = job else { break };
                    let outcome = run_job(job).await;
                    if tx.send(outcome).await.is_err() {
                        // Consumer is gone; stop pulling new jobs.
                        break;
                    }
                }
            });
        }
        drop(tx);

        struct EmitState {
            rx: mpsc::Receiver<Result<bool>>,
            complete: usize,
            errors: usize,
            total: usize,
            started: bool,
            failed: bool,
        }

        stream::unfold(
            EmitState {
                rx,
                complete: 0,
                errors: 0,
                total,
                started: false,
                failed: false,
            },
            |mut state| async move {
                if !state.started {
                    state.started = true;
                    let progress = Progress {
                        complete: 0,
                        total: state.total,
                        errors: 0,
                    };
                    return Some((Ok(progress), state));
                }
                if state.failed || state.complete + state.errors == state.total {
                    return None;
                }
                match state.rx.recv().await {
                    Some(Ok(success)) => {
                        if success {
                            state.complete += 1;
                        } else {
                            state.errors += 1;
                        }
                        let progress = Progress {
                            complete: state.complete,
                            total: state.total,
                            errors: state.errors,
                        };
                        Some((Ok(progress), state))
                    }
                    Some(Err(e)) => {
                        state.failed = true;
                        Some((Err(e), state))
                    }
                    // All worker senders dropped before the count was
                    // reached; end the stream rather than hang.
                    None => None,
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn collect_snapshots(
        stream: impl Stream<Item = Result<Progress>>,
    ) -> Vec<Progress> {
        stream.map(|item| item.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_all_successes_emit_one_snapshot_per_job_plus_initial() {
        for concurrency in [1, 25] {
            let job_count = 50;
            let jobs: Vec<usize> = (0..job_count).collect();
            let runner = JobRunner::new(concurrency).unwrap();
            let snapshots =
                collect_snapshots(runner.run(jobs, |_| async { Ok(true) })).await;

            assert_eq!(snapshots.len(), job_count + 1);
            for (i, progress) in snapshots.iter().enumerate() {
                assert_eq!(progress.complete, i);
                assert_eq!(progress.errors, 0);
                assert_eq!(progress.total, job_count);
            }
        }
    }

    #[tokio::test]
    async fn test_all_failures_are_counted_as_errors() {
        for concurrency in [1, 25] {
            let job_count = 50;
            let jobs: Vec<usize> = (0..job_count).collect();
            let runner = JobRunner::new(concurrency).unwrap();
            let snapshots =
                collect_snapshots(runner.run(jobs, |_| async { Ok(false) })).await;

            assert_eq!(snapshots.len(), job_count + 1);
            let last = snapshots.last().unwrap();
            assert_eq!(last.complete, 0);
            assert_eq!(last.errors, job_count);
            for (i, progress) in snapshots.iter().enumerate() {
                assert_eq!(progress.errors, i);
            }
        }
    }

    #[tokio::test]
    async fn test_mixed_outcomes_partition_matches_regardless_of_concurrency() {
        let job_count = 50;
        let succeeding = (0..job_count).filter(|i| i % 3 == 0).count();

        for concurrency in [1, 25] {
            let jobs: Vec<usize> = (0..job_count).collect();
            let runner = JobRunner::new(concurrency).unwrap();
            let snapshots =
                collect_snapshots(runner.run(jobs, |i| async move { Ok(i % 3 == 0) }))
                    .await;

            // Counts are monotonic and every result produces one emission.
            let mut previous = Progress {
                complete: 0,
                total: job_count,
                errors: 0,
            };
            for progress in &snapshots[1..] {
                assert_eq!(
                    progress.complete + progress.errors,
                    previous.complete + previous.errors + 1
                );
                assert!(progress.complete >= previous.complete);
                assert!(progress.errors >= previous.errors);
                previous = *progress;
            }

            let last = snapshots.last().unwrap();
            assert_eq!(last.complete, succeeding);
            assert_eq!(last.errors, job_count - succeeding);
        }
    }

    #[tokio::test]
    async fn test_empty_job_list_emits_only_the_initial_snapshot() {
        let runner = JobRunner::new(4).unwrap();
        let snapshots =
            collect_snapshots(runner.run(Vec::<usize>::new(), |_| async { Ok(true) }))
                .await;
        assert_eq!(
            snapshots,
            vec![Progress {
                complete: 0,
                total: 0,
                errors: 0
            }]
        );
    }

    #[tokio::test]
    async fn test_in_flight_jobs_never_exceed_the_concurrency_bound() {
        let job_count = 40;
        let concurrency = 5;
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<usize> = (0..job_count).collect();
        let runner = JobRunner::new(concurrency).unwrap();
        let in_flight_ref = Arc::clone(&in_flight);
        let max_ref = Arc::clone(&max_in_flight);
        let snapshots = collect_snapshots(runner.run(jobs, move |_| {
            let in_flight = Arc::clone(&in_flight_ref);
            let max = Arc::clone(&max_ref);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(true)
            }
        }))
        .await;

        assert_eq!(snapshots.len(), job_count + 1);
        assert!(max_in_flight.load(Ordering::SeqCst) <= concurrency);
        assert!(max_in_flight.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_zero_concurrency_fails_at_construction() {
        assert!(matches!(JobRunner::new(0), Err(EvalError::Config(_))));
        assert!(JobRunner::new(1).is_ok());
    }

    #[tokio::test]
    async fn test_fatal_error_is_yielded_and_terminates_the_stream() {
        let jobs: Vec<usize> = (0..10).collect();
        let runner = JobRunner::new(1).unwrap();
        let items: Vec<Result<Progress>> = runner
            .run(jobs, |i| async move {
                if i == 3 {
                    Err(EvalError::UnexpectedResponse("boom".to_string()))
                } else {
                    Ok(true)
                }
            })
            .collect()
            .await;

        // Initial snapshot, three successes, then the fatal error.
        assert_eq!(items.len(), 5);
        assert!(items[..4].iter().all(|item| item.is_ok()));
        assert!(items[4].is_err());
    }
}
