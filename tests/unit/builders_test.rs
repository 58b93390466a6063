//! Tests for builder modules

use std::collections::HashMap;

use prometheus_task_queue::builders::build_schedulers;
use prometheus_task_queue::config::{QueueConfig, SchedulerConfig};
use prometheus_task_queue::core::SchedulerError;
use prometheus_task_queue::runtime::TokioSpawner;

#[tokio::test]
async fn test_build_schedulers_per_queue() {
    let mut queues = HashMap::new();
    queues.insert("io".to_string(), QueueConfig::with_concurrency(8));
    queues.insert("gpu".to_string(), QueueConfig::with_concurrency(1));

    let runtime = TokioSpawner::current().unwrap();
    let schedulers = build_schedulers(&SchedulerConfig { queues }, &runtime).unwrap();

    assert_eq!(schedulers.len(), 2);
    assert_eq!(schedulers["io"].concurrency(), 8);
    assert_eq!(schedulers["gpu"].concurrency(), 1);

    let answer = schedulers["gpu"].add(|| async { Ok(42) });
    assert_eq!(answer.await.unwrap(), 42);
}

#[tokio::test]
async fn test_build_schedulers_rejects_invalid_config() {
    let mut queues = HashMap::new();
    queues.insert("broken".to_string(), QueueConfig::with_concurrency(0));

    let runtime = TokioSpawner::current().unwrap();
    let result = build_schedulers(&SchedulerConfig { queues }, &runtime);
    assert!(matches!(result, Err(SchedulerError::Config(_))));

    let empty = build_schedulers(&SchedulerConfig::default(), &runtime);
    assert!(matches!(empty, Err(SchedulerError::Config(_))));
}
