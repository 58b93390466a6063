//! Tests for tokio spawner utilities

use std::time::Duration;

use prometheus_task_queue::config::QueueConfig;
use prometheus_task_queue::core::{Clock, Scheduler, SchedulerError, Spawn};
use prometheus_task_queue::runtime::tokio_spawner::TokioSpawner;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_tokio_spawner_clock_advances() {
    let spawner = TokioSpawner::current().unwrap();
    let before = spawner.now();
    spawner.sleep(Duration::from_millis(15)).await;
    assert!(spawner.now().duration_since(before) >= Duration::from_millis(15));
}

#[test]
fn test_dedicated_runtime_runs_scheduler() {
    let spawner = TokioSpawner::with_worker_threads(2).unwrap();
    let scheduler = Scheduler::new(spawner.clone(), 2);

    let doubled = scheduler.add_delayed(|| async { Ok(21 * 2) }, Duration::from_millis(10));
    let value = spawner.handle().block_on(doubled).unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_from_config_rejects_zero_concurrency() {
    let runtime = TokioSpawner::current().unwrap();
    let result = Scheduler::from_config(&QueueConfig::with_concurrency(0), runtime);
    assert!(matches!(result, Err(SchedulerError::InvalidConcurrency(0))));
}
