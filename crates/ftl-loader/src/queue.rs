/*
 * queue.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! One-at-a-time execution of render jobs.
//!
//! For hosts that share a single engine runtime between concurrent requests
//! without it being safe to interleave them. Each submitted job starts only
//! after the previous job has finished, in submission order.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::build::BuildContext;
use crate::error::Result;
use crate::options::LoaderOptions;
use crate::pipeline::{Completion, FtlLoader};

#[derive(Debug, Default)]
pub struct SerializationQueue {
    tail: Mutex<Option<oneshot::Receiver<()>>>,
}

impl SerializationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` behind every job submitted before it.
    ///
    /// The position in the queue is taken when `submit` is called, not when
    /// the returned future is first polled. Dropping a returned future
    /// releases the jobs queued behind it.
    pub fn submit<F>(&self, job: F) -> impl Future<Output = F::Output> + Send + use<F>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let (done, finished) = oneshot::channel::<()>();
        let previous = self
            .tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(finished);

        async move {
            if let Some(previous) = previous {
                // An error only means the previous job was dropped.
                let _ = previous.await;
            }
            let output = job.await;
            let _ = done.send(());
            output
        }
    }
}

/// A loader whose requests run strictly one after another.
#[derive(Debug)]
pub struct SerialLoader {
    loader: Arc<FtlLoader>,
    queue: SerializationQueue,
}

impl SerialLoader {
    pub fn new(loader: FtlLoader) -> Self {
        Self {
            loader: Arc::new(loader),
            queue: SerializationQueue::new(),
        }
    }

    /// Like [`FtlLoader::pitch`], but the render starts only after every
    /// earlier request has delivered its result.
    pub fn pitch(
        &self,
        ctx: Arc<dyn BuildContext>,
        remaining_request: String,
        options: LoaderOptions,
        completion: Completion,
    ) -> impl Future<Output = Result<()>> + Send + use<> {
        let loader = Arc::clone(&self.loader);
        self.queue.submit(async move {
            loader
                .pitch(ctx, &remaining_request, &options, &completion)
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_never_interleave() {
        let queue = SerializationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..5u64)
            .map(|i| {
                let log = Arc::clone(&log);
                let job = queue.submit(async move {
                    log.lock().unwrap().push(format!("start {}", i));
                    // Later jobs finish faster when run in parallel.
                    tokio::time::sleep(Duration::from_millis(25 - 5 * i)).await;
                    log.lock().unwrap().push(format!("end {}", i));
                    i
                });
                tokio::spawn(job)
            })
            .collect();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap());
        }
        assert_eq!(finished, vec![0, 1, 2, 3, 4]);

        let expected: Vec<String> = (0..5)
            .flat_map(|i| [format!("start {}", i), format!("end {}", i)])
            .collect();
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_dropped_job_releases_queue() {
        let queue = SerializationQueue::new();
        let first = queue.submit(async { 1 });
        let second = queue.submit(async { 2 });
        drop(first);
        assert_eq!(second.await, 2);
    }
}
