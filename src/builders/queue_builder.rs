//! Builders to construct named schedulers from configuration.

use std::collections::HashMap;

use crate::config::SchedulerConfig;
use crate::core::{Clock, Scheduler, SchedulerError, Spawn};

/// Build one scheduler per configured queue, all sharing `runtime`.
///
/// # Errors
///
/// Returns [`SchedulerError::Config`] if the configuration fails validation.
pub fn build_schedulers<R>(
    cfg: &SchedulerConfig,
    runtime: &R,
) -> Result<HashMap<String, Scheduler<R>>, SchedulerError>
where
    R: Spawn + Clock + Clone + Send + Sync + 'static,
{
    cfg.validate()
        .map_err(|e| SchedulerError::Config(format!("config invalid: {e}")))?;

    let mut schedulers = HashMap::new();
    for (name, queue_cfg) in &cfg.queues {
        let scheduler = Scheduler::from_config(queue_cfg, runtime.clone())?;
        tracing::debug!("built scheduler `{}` with concurrency {}", name, queue_cfg.concurrency);
        schedulers.insert(name.clone(), scheduler);
    }

    Ok(schedulers)
}
