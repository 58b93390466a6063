//! Tests for configuration validation

use std::collections::HashMap;

use prometheus_task_queue::config::{QueueConfig, SchedulerConfig, CONCURRENCY_ENV};

#[test]
fn test_queue_config_validation() {
    assert!(QueueConfig::with_concurrency(4).validate().is_ok());
}

#[test]
fn test_queue_config_invalid_concurrency() {
    assert!(QueueConfig::with_concurrency(0).validate().is_err());
}

#[test]
fn test_scheduler_config_validation() {
    let mut queues = HashMap::new();
    queues.insert("queue1".to_string(), QueueConfig::with_concurrency(3));

    let config = SchedulerConfig { queues };
    assert!(config.validate().is_ok());
}

#[test]
fn test_scheduler_config_empty_queues() {
    let config = SchedulerConfig {
        queues: HashMap::new(),
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_scheduler_config_names_invalid_queue() {
    let mut queues = HashMap::new();
    queues.insert("slow".to_string(), QueueConfig::with_concurrency(0));

    let err = SchedulerConfig { queues }.validate().unwrap_err();
    assert!(err.contains("slow"));
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "queues": {
            "queue1": { "concurrency": 3 },
            "queue2": { "concurrency": 1 }
        }
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.queues["queue1"].concurrency, 3);
    assert_eq!(config.queues["queue2"].concurrency, 1);
}

#[test]
fn test_scheduler_config_from_bad_json() {
    assert!(SchedulerConfig::from_json_str("{ not json").is_err());
    assert!(SchedulerConfig::from_json_str(r#"{ "queues": { "q": { "concurrency": 0 } } }"#).is_err());
}

#[test]
fn test_queue_config_from_env() {
    // The only test touching this variable.
    std::env::set_var(CONCURRENCY_ENV, "6");
    let config = QueueConfig::from_env().unwrap();
    std::env::remove_var(CONCURRENCY_ENV);
    assert_eq!(config.concurrency, 6);
}
