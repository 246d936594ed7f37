//! # Parallel Dispatcher Module
//!
//! Worker pool a concorrenza limitata sopra `tokio::spawn` + `Semaphore`.
//!
//! ## Responsabilità:
//! - Clamp difensivo del limite richiesto a un quarto dei core disponibili
//! - Ammissione dei job via semaforo: mai più di `limit` in volo
//! - Drain finale: ogni job produce esattamente un JobResult immutabile
//! - Isolamento dei fallimenti: un job fallito (o in panic) non tocca i
//!   fratelli
//!
//! Nessuno stato mutabile condiviso tra i worker: i contatori vivono solo
//! nel Report Aggregator, dopo il drain.

use crate::job::{Job, JobResult};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Clamp the requested concurrency to at most a quarter of the available
/// processing units. The pipeline is a background batch task; saturating
/// the host is never the goal.
pub fn clamp_workers(requested: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let ceiling = (cores / 4).max(1);
    requested.clamp(1, ceiling)
}

/// Execute all jobs with at most `limit` running concurrently. Every job
/// yields exactly one result, in completion order; a worker panic becomes a
/// failed result for that job alone.
pub async fn dispatch<F, Fut>(jobs: Vec<Job>, limit: usize, worker: F) -> Result<Vec<JobResult>>
where
    F: Fn(Job) -> Fut,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = Vec::with_capacity(jobs.len());

    for job in jobs {
        // Suspends here once the pool is full: admit-on-first-free
        let permit = semaphore.clone().acquire_owned().await?;
        let relative_path = job.item.relative_path.clone();
        let original_size = job.item.size_bytes;
        let future = worker(job);

        let task = tokio::spawn(async move {
            let _permit = permit; // held for the lifetime of the job
            future.await
        });
        tasks.push((task, relative_path, original_size));
    }

    // Aspetta tutti i task e raccoglie i risultati
    let mut results = Vec::with_capacity(tasks.len());
    for (task, relative_path, original_size) in tasks {
        match task.await {
            Ok(result) => results.push(result),
            Err(e) => {
                debug!("Worker task aborted for {}: {}", relative_path.display(), e);
                results.push(JobResult::failed(
                    relative_path,
                    original_size,
                    format!("worker task aborted: {}", e),
                ));
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobStatus, WorkItem};
    use crate::marker::Tier;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_jobs(count: usize) -> Vec<Job> {
        (0..count)
            .map(|i| Job {
                item: WorkItem {
                    absolute_path: PathBuf::from(format!("/in/{}.jpg", i)),
                    relative_path: PathBuf::from(format!("{}.jpg", i)),
                    size_bytes: 100,
                    dimensions: None,
                    marker: Tier::None,
                },
                output_path: PathBuf::from(format!("/out/{}.jpg", i)),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_every_job_yields_one_result() {
        let results = dispatch(test_jobs(25), 4, |job| async move {
            JobResult::ok(job.item.relative_path, job.item.size_bytes, 50, None)
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 25);
        assert!(results.iter().all(|r| r.status == JobStatus::Ok));
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let limit = 3;
        let active_ref = active.clone();
        let peak_ref = peak.clone();

        let results = dispatch(test_jobs(20), limit, move |job| {
            let active = active_ref.clone();
            let peak = peak_ref.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                JobResult::ok(job.item.relative_path, job.item.size_bytes, 50, None)
            }
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= limit);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let results = dispatch(test_jobs(10), 4, |job| async move {
            if job.item.relative_path == PathBuf::from("7.jpg") {
                JobResult::failed(job.item.relative_path, job.item.size_bytes, "corrupt input".into())
            } else {
                JobResult::ok(job.item.relative_path, job.item.size_bytes, 50, None)
            }
        })
        .await
        .unwrap();

        let failed: Vec<_> = results.iter().filter(|r| r.status == JobStatus::Failed).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].relative_path, PathBuf::from("7.jpg"));
        assert_eq!(results.iter().filter(|r| r.status == JobStatus::Ok).count(), 9);
    }

    #[tokio::test]
    async fn test_panicking_worker_becomes_failed_result() {
        let results = dispatch(test_jobs(5), 2, |job| async move {
            if job.item.relative_path == PathBuf::from("2.jpg") {
                panic!("worker blew up");
            }
            JobResult::ok(job.item.relative_path, job.item.size_bytes, 50, None)
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 5);
        let failed: Vec<_> = results.iter().filter(|r| r.status == JobStatus::Failed).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].relative_path, PathBuf::from("2.jpg"));
    }

    #[test]
    fn test_clamp_workers() {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let ceiling = (cores / 4).max(1);

        // Requests beyond the ceiling are clamped, including absurd ones
        assert_eq!(clamp_workers(usize::MAX), ceiling);
        assert_eq!(clamp_workers(cores * 10), ceiling);
        // Small requests pass through
        assert_eq!(clamp_workers(1), 1);
        // Degenerate input still yields a working pool
        assert_eq!(clamp_workers(0), 1);
    }
}
