//! Performance prediction seam
//!
//! The dispatcher only needs the input/output contract: a kernel feature
//! vector goes in, one score per prediction slot comes out, higher is
//! better. Model internals live behind the [`Predictor`] trait; the
//! built-ins here cover testing and fixed-policy deployments, and a
//! learned model plugs into the same seam.

use crate::types::{DeviceKind, KernelFeatures};
use crate::{Result, SchedError};
use std::collections::HashMap;

/// Score a kernel on every prediction slot
pub trait Predictor: Send + Sync + std::fmt::Debug {
    /// Predict per-slot scores for the given kernel
    ///
    /// The returned vector has one entry per prediction slot, higher
    /// scores meaning better expected performance. A failure leaves no
    /// trace in the scheduler: the request is rejected and no job exists.
    fn predict(&self, features: &KernelFeatures) -> Result<Vec<f32>>;

    /// Short predictor name for logs
    fn name(&self) -> &'static str;
}

/// Score assigned to the pinned device class by the fixed-policy predictors
const PINNED_SCORE: f32 = 1000.0;
/// Score assigned to every other slot; far enough below the pinned score
/// that no threshold setting makes them substitutable
const OTHER_SCORE: f32 = 1.0;

/// Always predicts CPU slots as fastest by a large margin
///
/// Prevents any possibility of switching architectures; useful as a
/// baseline and for testing policy effectiveness.
#[derive(Debug, Clone)]
pub struct AlwaysCpu {
    scores: Vec<f32>,
}

impl AlwaysCpu {
    /// Build for the given slot device classes, in slot order
    #[must_use]
    pub fn new(kinds: &[DeviceKind]) -> Self {
        Self {
            scores: pin_kind(kinds, DeviceKind::Cpu),
        }
    }
}

impl Predictor for AlwaysCpu {
    fn predict(&self, _features: &KernelFeatures) -> Result<Vec<f32>> {
        Ok(self.scores.clone())
    }

    fn name(&self) -> &'static str {
        "always-cpu"
    }
}

/// Always predicts GPU slots as fastest by a large margin
#[derive(Debug, Clone)]
pub struct AlwaysGpu {
    scores: Vec<f32>,
}

impl AlwaysGpu {
    /// Build for the given slot device classes, in slot order
    #[must_use]
    pub fn new(kinds: &[DeviceKind]) -> Self {
        Self {
            scores: pin_kind(kinds, DeviceKind::Gpu),
        }
    }
}

impl Predictor for AlwaysGpu {
    fn predict(&self, _features: &KernelFeatures) -> Result<Vec<f32>> {
        Ok(self.scores.clone())
    }

    fn name(&self) -> &'static str {
        "always-gpu"
    }
}

fn pin_kind(kinds: &[DeviceKind], pinned: DeviceKind) -> Vec<f32> {
    kinds
        .iter()
        .map(|&kind| if kind == pinned { PINNED_SCORE } else { OTHER_SCORE })
        .collect()
}

/// Static per-kernel score table
///
/// Scores measured offline (e.g. inverted runtimes) keyed by kernel id.
/// Kernels absent from the table fail prediction, which rejects the
/// request without touching any queue.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    slots: usize,
    table: HashMap<u32, Vec<f32>>,
}

impl ScoreTable {
    /// Build a table for `slots` prediction slots
    ///
    /// Every row must carry exactly one score per slot.
    pub fn new(slots: usize, entries: impl IntoIterator<Item = (u32, Vec<f32>)>) -> Result<Self> {
        let mut table = HashMap::new();
        for (kernel, scores) in entries {
            if scores.len() != slots {
                return Err(SchedError::Predict(format!(
                    "score table row for kernel {kernel} has {} entries, expected {slots}",
                    scores.len()
                )));
            }
            table.insert(kernel, scores);
        }
        Ok(Self { slots, table })
    }

    /// Number of prediction slots each row covers
    #[must_use]
    pub fn slots(&self) -> usize {
        self.slots
    }
}

impl Predictor for ScoreTable {
    fn predict(&self, features: &KernelFeatures) -> Result<Vec<f32>> {
        self.table
            .get(&features.kernel)
            .cloned()
            .ok_or_else(|| {
                SchedError::Predict(format!("no score table entry for kernel {}", features.kernel))
            })
    }

    fn name(&self) -> &'static str {
        "table"
    }
}
