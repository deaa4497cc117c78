//! Runs queued sync tasks one at a time, highest priority first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use clustersync_store::ChainStore;

use crate::error::{Result, SyncError};
use crate::task::{SyncOutcome, SyncTask};

/// Capacity of the submission queue.
const QUEUE_CAPACITY: usize = 1000;

/// A unit of work for the [`Synchronizer`].
#[async_trait]
pub trait Task: Send {
    /// Run against the local store.
    async fn run(self: Box<Self>, store: &dyn ChainStore) -> Result<SyncOutcome>;

    /// Higher runs first.
    fn priority(&self) -> u64;

    /// Peer the task fetches from.
    fn peer_id(&self) -> &str;
}

#[async_trait]
impl Task for SyncTask {
    async fn run(self: Box<Self>, store: &dyn ChainStore) -> Result<SyncOutcome> {
        SyncTask::run(*self, store).await
    }

    /// Taller targets first.
    fn priority(&self) -> u64 {
        self.header().number
    }

    fn peer_id(&self) -> &str {
        SyncTask::peer_id(self)
    }
}

/// Counts of finished tasks by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynchronizerStats {
    pub synced: usize,
    pub stale: usize,
    pub already_known: usize,
    pub failed: usize,
}

struct Queued {
    priority: u64,
    seq: u64,
    task: Box<dyn Task>,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Max-heap on priority; among equals the earlier submission wins.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Background runner for sync tasks against one store.
pub struct Synchronizer {
    sender: mpsc::Sender<Box<dyn Task>>,
    worker: JoinHandle<SynchronizerStats>,
}

impl Synchronizer {
    /// Start the worker. Must be called within a tokio runtime.
    pub fn spawn<S: ChainStore + 'static>(store: Arc<S>) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(run_worker(store, receiver));
        Self { sender, worker }
    }

    /// Queue a task.
    pub async fn submit(&self, task: Box<dyn Task>) -> Result<()> {
        self.sender.send(task).await.map_err(|_| SyncError::Closed)
    }

    /// Stop accepting tasks, run everything still queued, and report.
    pub async fn close(self) -> Result<SynchronizerStats> {
        drop(self.sender);
        self.worker.await.map_err(|_| SyncError::Closed)
    }
}

async fn run_worker<S: ChainStore + 'static>(
    store: Arc<S>,
    mut receiver: mpsc::Receiver<Box<dyn Task>>,
) -> SynchronizerStats {
    let mut stats = SynchronizerStats::default();
    let mut queue = BinaryHeap::new();
    let mut seq = 0u64;

    let mut enqueue = |queue: &mut BinaryHeap<Queued>, task: Box<dyn Task>| {
        queue.push(Queued {
            priority: task.priority(),
            seq,
            task,
        });
        seq += 1;
    };

    loop {
        while let Ok(task) = receiver.try_recv() {
            enqueue(&mut queue, task);
        }

        let Some(next) = queue.pop() else {
            match receiver.recv().await {
                Some(task) => {
                    enqueue(&mut queue, task);
                    continue;
                }
                None => break,
            }
        };

        let peer_id = next.task.peer_id().to_string();
        match next.task.run(store.as_ref()).await {
            Ok(SyncOutcome::Synced { applied }) => {
                stats.synced += 1;
                tracing::info!(peer = %peer_id, applied, "sync task finished");
            }
            Ok(SyncOutcome::Stale { .. }) => stats.stale += 1,
            Ok(SyncOutcome::AlreadyKnown) => stats.already_known += 1,
            Err(err) => {
                stats.failed += 1;
                tracing::warn!(peer = %peer_id, error = %err, "sync task failed");
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use clustersync_core::AuthoritySeal;
    use clustersync_store::MemoryChainStore;
    use std::sync::Mutex;

    struct Probe {
        id: u64,
        priority: u64,
        outcome: Option<SyncOutcome>,
        log: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait]
    impl Task for Probe {
        async fn run(self: Box<Self>, _store: &dyn ChainStore) -> Result<SyncOutcome> {
            self.log.lock().unwrap().push(self.id);
            self.outcome.ok_or(SyncError::MissingBlocks {
                requested: 1,
                received: 0,
            })
        }

        fn priority(&self) -> u64 {
            self.priority
        }

        fn peer_id(&self) -> &str {
            "probe"
        }
    }

    fn probe(id: u64, priority: u64, outcome: Option<SyncOutcome>, log: &Arc<Mutex<Vec<u64>>>) -> Box<dyn Task> {
        Box::new(Probe {
            id,
            priority,
            outcome,
            log: Arc::clone(log),
        })
    }

    #[tokio::test]
    async fn test_priority_order_fifo_on_ties() {
        let store = Arc::new(MemoryChainStore::new(Arc::new(AuthoritySeal::open())));
        let synchronizer = Synchronizer::spawn(store);
        let log = Arc::new(Mutex::new(Vec::new()));
        let done = Some(SyncOutcome::Synced { applied: 1 });

        synchronizer.submit(probe(1, 5, done, &log)).await.unwrap();
        synchronizer.submit(probe(2, 9, done, &log)).await.unwrap();
        synchronizer.submit(probe(3, 5, done, &log)).await.unwrap();
        synchronizer.submit(probe(4, 1, done, &log)).await.unwrap();

        let stats = synchronizer.close().await.unwrap();
        assert_eq!(stats.synced, 4);
        assert_eq!(*log.lock().unwrap(), vec![2, 1, 3, 4]);
    }

    #[tokio::test]
    async fn test_stats_by_outcome() {
        let store = Arc::new(MemoryChainStore::new(Arc::new(AuthoritySeal::open())));
        let synchronizer = Synchronizer::spawn(store);
        let log = Arc::new(Mutex::new(Vec::new()));

        synchronizer
            .submit(probe(1, 0, Some(SyncOutcome::AlreadyKnown), &log))
            .await
            .unwrap();
        synchronizer
            .submit(probe(
                2,
                0,
                Some(SyncOutcome::Stale {
                    tip_height: 1000,
                    fork_height: 500,
                }),
                &log,
            ))
            .await
            .unwrap();
        synchronizer.submit(probe(3, 0, None, &log)).await.unwrap();

        let stats = synchronizer.close().await.unwrap();
        assert_eq!(
            stats,
            SynchronizerStats {
                synced: 0,
                stale: 1,
                already_known: 1,
                failed: 1,
            }
        );
    }
}
