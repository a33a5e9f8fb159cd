mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use spool_core::config::QueueConfig;
use spool_core::domain::{HandleOutcome, Pointer, TaskError, TaskOutcome};
use spool_core::impls::FileStore;
use spool_core::ports::{Clock, FixedClock, KeyValueStore};
use spool_core::{BatchQueue, BatchTask};

use common::{clock, env, env_with_store, store_is_empty};

/// Sleeps on every item so two passes overlap.
#[derive(Default)]
struct Sleepy {
    calls: AtomicUsize,
}

#[async_trait]
impl BatchTask for Sleepy {
    type Item = u32;

    async fn task(&self, _item: &u32) -> Result<TaskOutcome<u32>, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(TaskOutcome::Done)
    }
}

/// Burns 21 seconds of the pinned clock per item.
struct Slow {
    clock: Arc<FixedClock>,
    seen: std::sync::Mutex<Vec<u32>>,
}

#[async_trait]
impl BatchTask for Slow {
    type Item = u32;

    async fn task(&self, item: &u32) -> Result<TaskOutcome<u32>, TaskError> {
        self.clock.advance(chrono::Duration::seconds(21));
        self.seen.lock().unwrap().push(*item);
        Ok(TaskOutcome::Done)
    }
}

#[tokio::test]
async fn concurrent_passes_drain_once() {
    let env = env();
    let queue = Arc::new(BatchQueue::new(
        env.ctx.clone(),
        Pointer::new("pmld", "async_queue"),
        Sleepy::default(),
        QueueConfig::default(),
    ));
    queue.push(1).push(2).push(3);
    queue.save().await.unwrap();

    let (a, b) = tokio::join!(queue.handle(), queue.handle());
    let outcomes = [a.unwrap(), b.unwrap()];

    let drained = outcomes
        .iter()
        .filter(|o| matches!(o, HandleOutcome::Drained(_)))
        .count();
    let busy = outcomes
        .iter()
        .filter(|o| **o == HandleOutcome::AlreadyRunning)
        .count();
    assert_eq!((drained, busy), (1, 1));
    assert_eq!(queue.task().calls.load(Ordering::SeqCst), 3);
    assert!(queue.is_queue_empty().await.unwrap());
}

#[tokio::test]
async fn interrupted_passes_lose_nothing() {
    let env = env();
    let queue = BatchQueue::new(
        env.ctx.clone(),
        Pointer::new("pmld", "async_queue"),
        Slow {
            clock: env.clock.clone(),
            seen: Default::default(),
        },
        QueueConfig::default(),
    );
    for n in 1..=5 {
        queue.push(n);
    }
    queue.save().await.unwrap();

    let mut passes = 0;
    loop {
        passes += 1;
        let HandleOutcome::Drained(report) = queue.handle().await.unwrap() else {
            panic!("pass {passes} did not drain");
        };
        assert_eq!(report.items_processed, 1);
        if report.completed {
            break;
        }
        assert!(report.budget_exhausted && report.redispatched);
        assert!(passes < 5);
    }

    assert_eq!(passes, 5);
    assert_eq!(*queue.task().seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(env.transport.count().await, 4);
    assert!(store_is_empty(&env).await);
}

#[tokio::test]
async fn batches_survive_a_restart_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spool.json");
    let pointer = Pointer::new("pmld", "async_queue");

    {
        let clock = clock();
        let shared: Arc<dyn Clock> = clock.clone();
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path, shared).await.unwrap());
        let env = env_with_store(clock, store);
        let queue = BatchQueue::new(env.ctx.clone(), pointer.clone(), Sleepy::default(), QueueConfig::default());
        queue.push(10).push(20);
        queue.save().await.unwrap();
    }

    let clock = clock();
    let shared: Arc<dyn Clock> = clock.clone();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path, shared).await.unwrap());
    let env = env_with_store(clock, store);
    let queue = BatchQueue::new(env.ctx.clone(), pointer, Sleepy::default(), QueueConfig::default());

    assert_eq!(queue.batch_count().await.unwrap(), 1);
    let outcome = queue.handle_cron_healthcheck().await.unwrap();

    assert!(matches!(outcome, HandleOutcome::Drained(ref r) if r.completed));
    assert_eq!(queue.task().calls.load(Ordering::SeqCst), 2);
    assert!(queue.is_queue_empty().await.unwrap());
}
