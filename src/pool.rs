//! Parallel dump parsing
//!
//! Fans shard parsing out over a pool of worker threads. A feeder thread
//! cuts the input into entity-aligned shards and queues them on a bounded
//! task channel; each worker parses its shards and pushes entities into a
//! single bounded merge channel that the consumer drains through the
//! `Iterator` impl.
//!
//! Ordering: with one worker the output keeps document order; with more
//! workers entities arrive whole but interleaved in completion order. Both
//! channels are bounded, so memory stays flat when the consumer is slower
//! than the parsers.
//!
//! The first error from any thread cancels the rest of the pool and is
//! yielded once as [`WorkerFailure`]; after that the iterator is fused.
//! Dropping the reader mid-stream also cancels the pool and joins all
//! threads.

use crate::dump::{DumpError, EntityReader};
use crate::entity::Entity;
use crate::shard::{DEFAULT_SHARD_BYTES, ShardSplitter};
use crossbeam_channel::{Receiver, Sender, bounded};
use log::debug;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Entities buffered between the workers and the consumer
const MERGE_QUEUE: usize = 1024;

/// Error surfaced when any thread in the pool fails. Carries the first
/// error the merge channel delivered; the remaining threads are cancelled.
#[derive(Debug, Error)]
#[error("Worker failure: {0}")]
pub struct WorkerFailure(#[source] pub DumpError);

/// Iterator over dump entities, parsed by a pool of worker threads
pub struct ParallelReader {
    entities: Option<Receiver<Result<Entity, DumpError>>>,
    handles: Vec<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
    done: bool,
}

impl ParallelReader {
    /// Spawn a pool reading `input` with `workers` parse threads
    pub fn new<R>(input: R, workers: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::with_shard_bytes(input, workers, DEFAULT_SHARD_BYTES)
    }

    /// Spawn a pool with an explicit shard target size
    pub fn with_shard_bytes<R>(input: R, workers: usize, shard_bytes: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        let workers = workers.max(1);
        let cancel = Arc::new(AtomicBool::new(false));
        // Two shards per worker keeps everyone busy without holding much
        // of the dump in memory.
        let (task_tx, task_rx) = bounded::<Vec<u8>>(workers * 2);
        let (merge_tx, merge_rx) = bounded(MERGE_QUEUE);
        let mut handles = Vec::with_capacity(workers + 1);

        debug!("spawning {} parse workers, shard target {} bytes", workers, shard_bytes);

        let feeder_cancel = Arc::clone(&cancel);
        let feeder_merge = merge_tx.clone();
        handles.push(spawn_named("claimstream-feeder".to_string(), move || {
            feed_shards(input, shard_bytes, task_tx, feeder_merge, feeder_cancel);
        }));

        for n in 0..workers {
            let tasks = task_rx.clone();
            let merge = merge_tx.clone();
            let flag = Arc::clone(&cancel);
            handles.push(spawn_named(format!("claimstream-worker-{}", n), move || {
                parse_shards(tasks, merge, flag);
            }));
        }

        Self {
            entities: Some(merge_rx),
            handles,
            cancel,
            done: false,
        }
    }

    /// Cancel outstanding work, drain the merge channel until every sender
    /// is gone, then join all threads. Idempotent.
    fn shut_down(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(rx) = self.entities.take() {
            // Producers may be blocked on a full merge channel; draining
            // unblocks them so they can observe the cancel flag.
            for _ in rx.iter() {}
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Iterator for ParallelReader {
    type Item = Result<Entity, WorkerFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let received = match &self.entities {
            Some(rx) => rx.recv(),
            None => return None,
        };
        match received {
            Ok(Ok(entity)) => Some(Ok(entity)),
            Ok(Err(e)) => {
                self.done = true;
                self.shut_down();
                Some(Err(WorkerFailure(e)))
            }
            // Channel disconnected: every producer exited cleanly
            Err(_) => {
                self.done = true;
                self.shut_down();
                None
            }
        }
    }
}

impl Drop for ParallelReader {
    fn drop(&mut self) {
        self.shut_down();
    }
}

fn spawn_named(name: String, f: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    thread::Builder::new()
        .name(name)
        .spawn(f)
        .expect("failed to spawn pool thread")
}

/// Feeder: split the input into shards and queue them for the workers
fn feed_shards<R: Read>(
    input: R,
    shard_bytes: usize,
    tasks: Sender<Vec<u8>>,
    merge: Sender<Result<Entity, DumpError>>,
    cancel: Arc<AtomicBool>,
) {
    let mut count = 0usize;
    for shard in ShardSplitter::with_target_bytes(input, shard_bytes) {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        match shard {
            Ok(bytes) => {
                count += 1;
                // Send fails only when every worker is gone
                if tasks.send(bytes).is_err() {
                    return;
                }
            }
            Err(e) => {
                cancel.store(true, Ordering::Relaxed);
                let _ = merge.send(Err(DumpError::Io(e)));
                return;
            }
        }
    }
    debug!("dump split into {} shards", count);
}

/// Worker: parse queued shards and push entities into the merge channel
fn parse_shards(
    tasks: Receiver<Vec<u8>>,
    merge: Sender<Result<Entity, DumpError>>,
    cancel: Arc<AtomicBool>,
) {
    for shard in tasks.iter() {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        for parsed in EntityReader::new(shard.as_slice()) {
            match parsed {
                Ok(entity) => {
                    if merge.send(Ok(entity)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    cancel.store(true, Ordering::Relaxed);
                    let _ = merge.send(Err(e));
                    return;
                }
            }
        }
    }
}
