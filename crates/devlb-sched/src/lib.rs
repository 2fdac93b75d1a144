//! devlb-sched: prediction-driven scheduling core
//!
//! Arbitrates a fixed set of heterogeneous compute devices (CPU packages,
//! CPU partitions, GPUs) among competing client kernels:
//!
//! - **Hardware queues**: per-device admission state (running/waiting lists)
//! - **Candidate ranking**: threshold-based architecture substitution
//! - **Predictor seam**: feature vector in, per-slot score vector out
//! - **Dispatcher**: notify/assign/release plus opportunistic stealing
//!
//! The core is synchronous and single-threaded by design: the daemon's
//! request loop owns the [`Dispatcher`] exclusively and drives one request
//! to completion at a time.

#![warn(missing_docs)]

pub mod dispatcher;
pub mod job;
pub mod predict;
pub mod queue;
pub mod rank;
pub mod slots;
pub mod types;

pub use dispatcher::{AssignOutcome, DispatchStats, Dispatcher, StartedJob};
pub use job::Job;
pub use predict::{AlwaysCpu, AlwaysGpu, Predictor, ScoreTable};
pub use queue::{HwQueue, HwQueueConfig};
pub use slots::{SlotConfig, SlotMap};
pub use types::{
    ClientId, DeviceKind, KernelFeatures, QueueIdx, ResourceAlloc, SlotIdx, MAX_QUEUES,
    NUM_FEATURES,
};

use thiserror::Error;

/// Scheduler error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedError {
    /// No configured hardware queue matches the given allocation
    #[error("no hardware queue matches allocation {0}")]
    UnmappedAlloc(ResourceAlloc),

    /// Release for a client with no running job anywhere
    #[error("client {0} has no running job")]
    UnknownClient(ClientId),

    /// The predictor could not score the kernel
    #[error("prediction failed: {0}")]
    Predict(String),

    /// No prediction slot maps to any configured queue
    #[error("no candidate queue for client {0}")]
    NoCandidates(ClientId),

    /// A queue's allocation is missing from the prediction-slot table
    #[error("queue {0} has no prediction slot")]
    MissingSlot(QueueIdx),
}

/// Result type for scheduling operations
pub type Result<T> = std::result::Result<T, SchedError>;
