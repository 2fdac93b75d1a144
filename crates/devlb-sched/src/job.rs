//! One client's kernel-execution request
//!
//! A job is owned by value by whichever hardware queue currently holds it,
//! so a job can never appear in two queues at once: moving it out of one
//! list is the only way to insert it into another.

use crate::types::{ClientId, KernelFeatures, ResourceAlloc};
use std::time::{Duration, Instant};

/// A pending or running kernel execution
#[derive(Debug, Clone)]
pub struct Job {
    /// Requesting client
    pub client: ClientId,
    /// Kernel features submitted with the request
    pub features: KernelFeatures,
    /// Predicted score per prediction slot (empty for notified jobs)
    pub predictions: Vec<f32>,
    /// Resources granted, set when the job is admitted to a queue
    pub alloc: Option<ResourceAlloc>,
    queued_at: Option<Instant>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl Job {
    /// Create a job for a prediction-driven request
    #[must_use]
    pub fn new(client: ClientId, features: KernelFeatures, predictions: Vec<f32>) -> Self {
        Self {
            client,
            features,
            predictions,
            alloc: None,
            queued_at: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Create a job for a client that picked its own device
    ///
    /// Carries no features or predictions; it exists purely for occupancy
    /// bookkeeping.
    #[must_use]
    pub fn notified(client: ClientId) -> Self {
        Self::new(client, KernelFeatures::default(), Vec::new())
    }

    /// Time spent waiting before dispatch, if the job was ever queued
    #[must_use]
    pub fn queued_duration(&self) -> Option<Duration> {
        match (self.queued_at, self.started_at) {
            (Some(queued), Some(started)) => Some(started.duration_since(queued)),
            _ => None,
        }
    }

    /// Time spent running, if the job has finished
    #[must_use]
    pub fn run_duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished.duration_since(started)),
            _ => None,
        }
    }

    pub(crate) fn mark_queued(&mut self) {
        self.queued_at = Some(Instant::now());
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished_at = Some(Instant::now());
    }
}
