mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spool_core::app::WorkerRoutes;
use spool_core::config::QueueConfig;
use spool_core::domain::{Pointer, TaskError, TaskOutcome};
use spool_core::ports::KeyValueStore;
use spool_core::{AsyncTask, BatchQueue, BatchTask, JobHandler};

use common::{env, post, store_is_empty};

#[derive(Debug, Serialize, Deserialize)]
struct Ping {
    n: u32,
}

#[derive(Default)]
struct CountingJob {
    runs: AtomicUsize,
}

#[async_trait]
impl JobHandler for CountingJob {
    type Payload = Ping;

    async fn handle(&self, _payload: Ping) -> Result<(), TaskError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct Doubler {
    seen: std::sync::Mutex<Vec<u32>>,
}

#[async_trait]
impl BatchTask for Doubler {
    type Item = u32;

    async fn task(&self, item: &u32) -> Result<TaskOutcome<u32>, TaskError> {
        self.seen.lock().unwrap().push(*item);
        Ok(TaskOutcome::Done)
    }
}

fn path_and_query(url: &reqwest::Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

#[tokio::test]
async fn dispatched_job_runs_through_the_router() {
    let env = env();
    let task = Arc::new(AsyncTask::new(
        env.ctx.clone(),
        Pointer::new("pmld", "async_job"),
        CountingJob::default(),
    ));
    let mut routes = WorkerRoutes::new();
    task.register(&mut routes).unwrap();
    let router = routes.into_router();

    task.set(Ping { n: 7 });
    task.dispatch().await.unwrap();
    let sent = env.transport.take().await;
    assert_eq!(sent.len(), 1);

    let body = serde_json::to_vec(&sent[0].request.body).unwrap();
    let (status, text) = post(router, &path_and_query(&sent[0].url), body).await;

    assert_eq!((status, text.as_str()), (StatusCode::OK, "Done"));
    assert_eq!(task.handler().runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bad_token_is_refused_before_anything_runs() {
    let env = env();
    let task = Arc::new(AsyncTask::new(
        env.ctx.clone(),
        Pointer::new("pmld", "async_job"),
        CountingJob::default(),
    ));
    let mut routes = WorkerRoutes::new();
    task.register(&mut routes).unwrap();
    let router = routes.into_router();

    let (status, text) = post(
        router.clone(),
        "/test/async-job/v1/pmld_async_job?token=not-a-hash",
        r#"{"n": 1}"#,
    )
    .await;
    assert_eq!((status, text.as_str()), (StatusCode::FORBIDDEN, "-1"));

    // a body that cannot decode still yields -1: the body is never read
    let (status, text) = post(router, "/test/async-job/v1/pmld_async_job", "not json").await;
    assert_eq!((status, text.as_str()), (StatusCode::FORBIDDEN, "-1"));

    assert_eq!(task.handler().runs.load(Ordering::SeqCst), 0);
    assert!(store_is_empty(&env).await);
}

#[tokio::test]
async fn bad_token_leaves_queue_and_lock_alone() {
    let env = env();
    let queue = Arc::new(BatchQueue::new(
        env.ctx.clone(),
        Pointer::new("pmld", "async_queue"),
        Doubler::default(),
        QueueConfig::default(),
    ));
    queue.push(1).push(2);
    queue.save().await.unwrap();

    let mut routes = WorkerRoutes::new();
    queue.register(&mut routes).unwrap();

    let (status, text) = post(
        routes.into_router(),
        "/test/async-job/v1/pmld_async_queue?token=forged",
        "{}",
    )
    .await;

    assert_eq!((status, text.as_str()), (StatusCode::FORBIDDEN, "-1"));
    assert!(queue.task().seen.lock().unwrap().is_empty());
    assert_eq!(queue.batch_count().await.unwrap(), 1);
    let lock = env.store.get(&queue.pointer().lock_key()).await.unwrap();
    assert!(lock.is_none());
}

#[tokio::test]
async fn queue_trigger_drains_over_http() {
    let env = env();
    let queue = Arc::new(BatchQueue::new(
        env.ctx.clone(),
        Pointer::new("pmld", "async_queue"),
        Doubler::default(),
        QueueConfig::default(),
    ));
    let mut routes = WorkerRoutes::new();
    queue.register(&mut routes).unwrap();
    let router = routes.into_router();

    queue.push(4).push(5).push(6);
    queue.save().await.unwrap();
    queue.dispatch().await.unwrap();

    let sent = env.transport.take().await;
    assert_eq!(sent[0].request.body, json!({}));
    let (status, text) = post(router, &path_and_query(&sent[0].url), "{}").await;

    assert_eq!((status, text.as_str()), (StatusCode::OK, "Done"));
    assert_eq!(*queue.task().seen.lock().unwrap(), vec![4, 5, 6]);
    assert!(queue.is_queue_empty().await.unwrap());
    assert!(!queue.is_process_running().await.unwrap());
    assert!(env.transport.sent().await.is_empty());
}
