//! Startup configuration validation
//!
//! Every check here guards an assumption the scheduling core relies on
//! without rechecking; a failure aborts startup rather than leaving the
//! daemon partially initialized.

use crate::config::{DaemonConfig, PredictorKind};
use crate::{ConfigError, Result};
use devlb_sched::MAX_QUEUES;
use std::collections::HashSet;

/// Validate a loaded configuration
pub fn validate(config: &DaemonConfig) -> Result<()> {
    if config.slots.is_empty() {
        return Err(ConfigError::Validation(
            "no prediction slots configured".to_string(),
        ));
    }
    if config.queues.is_empty() {
        return Err(ConfigError::Validation(
            "no hardware queues configured".to_string(),
        ));
    }
    if config.queues.len() > MAX_QUEUES {
        return Err(ConfigError::Validation(format!(
            "{} hardware queues configured, wire protocol supports at most {MAX_QUEUES}",
            config.queues.len()
        )));
    }

    if !(0.0..1.0).contains(&config.threshold) {
        return Err(ConfigError::InvalidValue {
            field: "threshold".to_string(),
            message: format!("{} is outside [0.0, 1.0)", config.threshold),
        });
    }

    let mut seen = HashSet::new();
    for slot in &config.slots {
        if !seen.insert(slot.alloc()) {
            return Err(ConfigError::Validation(format!(
                "duplicate prediction slot for allocation {}",
                slot.alloc()
            )));
        }
    }

    for (i, queue) in config.queues.iter().enumerate() {
        if queue.max_running == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_running".to_string(),
                message: format!("queue {i} allows zero concurrent jobs"),
            });
        }
        if !seen.contains(&queue.alloc()) {
            return Err(ConfigError::Validation(format!(
                "queue {i} ({}) has no prediction slot",
                queue.alloc()
            )));
        }
    }

    if let PredictorKind::Table { entries } = &config.predictor {
        let mut kernels = HashSet::new();
        for entry in entries {
            if entry.scores.len() != config.slots.len() {
                return Err(ConfigError::Validation(format!(
                    "score table row for kernel {} has {} entries, expected {}",
                    entry.kernel,
                    entry.scores.len(),
                    config.slots.len()
                )));
            }
            if !kernels.insert(entry.kernel) {
                return Err(ConfigError::Validation(format!(
                    "duplicate score table row for kernel {}",
                    entry.kernel
                )));
            }
        }
    }

    Ok(())
}
