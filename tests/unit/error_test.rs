//! Tests for error types

use prometheus_task_queue::core::{SchedulerError, TaskError};

#[test]
fn test_invalid_concurrency_error() {
    let err = SchedulerError::InvalidConcurrency(0);
    assert_eq!(format!("{}", err), "invalid concurrency: 0");
}

#[test]
fn test_config_error() {
    let err = SchedulerError::Config("queue `a` invalid".to_string());
    assert_eq!(format!("{}", err), "config error: queue `a` invalid");
}

#[test]
fn test_runtime_error() {
    let err = SchedulerError::Runtime("no reactor".to_string());
    assert_eq!(format!("{}", err), "runtime error: no reactor");
}

#[test]
fn test_task_error_messages() {
    assert_eq!(TaskError::Panicked("Beep".into()).to_string(), "task panicked: Beep");
    assert_eq!(TaskError::Abandoned.to_string(), "task abandoned before it settled");
    assert_eq!(TaskError::AlreadyResumed.to_string(), "task already resumed");
    assert_eq!(
        TaskError::failed(std::io::Error::other("disk")).to_string(),
        "task failed: disk"
    );
}

#[test]
fn test_task_error_converts_to_anyhow() {
    let err: anyhow::Error = TaskError::Abandoned.into();
    assert!(err.downcast_ref::<TaskError>().is_some());
}
