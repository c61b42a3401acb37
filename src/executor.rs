/*
 *
 *  *
 *  *      Copyright (c) 2018-2025, SnackCloud All rights reserved.
 *  *
 *  *   Redistribution and use in source and binary forms, with or without
 *  *   modification, are permitted provided that the following conditions are met:
 *  *
 *  *   Redistributions of source code must retain the above copyright notice,
 *  *   this list of conditions and the following disclaimer.
 *  *   Redistributions in binary form must reproduce the above copyright
 *  *   notice, this list of conditions and the following disclaimer in the
 *  *   documentation and/or other materials provided with the distribution.
 *  *   Neither the name of the www.snackcloud.cn developer nor the names of its
 *  *   contributors may be used to endorse or promote products derived from
 *  *   this software without specific prior written permission.
 *  *   Author: SnackCloud
 *  *
 *
 */
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::thread;
use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool for asynchronous cache rebuilds, fed by a bounded
/// queue. `submit` never blocks: a full queue rejects the job (drop-and-log),
/// and the caller decides what to unwind (typically its rebuild lock).
pub struct RebuildExecutor {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl RebuildExecutor {
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(queue_depth.max(1));

        let workers = (0..workers.max(1))
            .map(|i| {
                let receiver: Receiver<Job> = receiver.clone();
                thread::Builder::new()
                    .name(format!("cache-rebuild-{i}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn rebuild worker")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Returns false when the queue is full or the pool is shut down; the
    /// job is dropped in that case.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = self.sender.as_ref() else {
            return false;
        };
        match sender.try_send(Box::new(job)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("rebuild queue full; dropping job");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl Drop for RebuildExecutor {
    fn drop(&mut self) {
        // Closing the channel lets every worker drain and exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Async counterpart: in-flight rebuilds are bounded by semaphore permits
/// instead of a queue; anything beyond the bound is rejected outright.
#[cfg(feature = "async")]
pub struct AsyncRebuildExecutor {
    permits: std::sync::Arc<tokio::sync::Semaphore>,
}

#[cfg(feature = "async")]
impl AsyncRebuildExecutor {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            permits: std::sync::Arc::new(tokio::sync::Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Spawns `job` onto the runtime if a permit is free; returns false and
    /// drops the job otherwise.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match std::sync::Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                tokio::spawn(async move {
                    job.await;
                    drop(permit);
                });
                true
            }
            Err(_) => {
                warn!("rebuild pool saturated; dropping job");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn jobs_run_on_the_pool() {
        let pool = RebuildExecutor::new(2, 8);
        let (done_tx, done_rx) = mpsc::channel();

        for i in 0..5 {
            let done_tx = done_tx.clone();
            assert!(pool.submit(move || done_tx.send(i).unwrap()));
        }

        let mut seen: Vec<i32> = (0..5)
            .map(|_| done_rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let pool = RebuildExecutor::new(1, 1);
        let (started_tx, started_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(2);

        // Occupy the single worker until the gate opens.
        let blocker_gate = gate_rx.clone();
        assert!(pool.submit(move || {
            started_tx.send(()).unwrap();
            let _ = blocker_gate.recv();
        }));
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        // Worker busy: this one parks in the queue.
        let queued_gate = gate_rx.clone();
        assert!(pool.submit(move || {
            let _ = queued_gate.recv();
        }));

        // Queue full: rejected, not blocked.
        assert!(!pool.submit(|| {}));

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_pool_bounds_in_flight_jobs() {
        let pool = AsyncRebuildExecutor::new(2);
        let gate = Arc::new(tokio::sync::Semaphore::new(0));

        for _ in 0..2 {
            let gate = Arc::clone(&gate);
            assert!(pool.submit(async move {
                gate.acquire().await.unwrap().forget();
            }));
        }
        assert!(!pool.submit(async {}));

        gate.add_permits(2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pool.submit(async {}));
    }
}
