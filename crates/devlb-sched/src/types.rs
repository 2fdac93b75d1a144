//! Core identifiers and value types
//!
//! Newtype indices keep the three index spaces (clients, hardware queues,
//! prediction slots) from silently crossing, which was the main source of
//! alignment bugs in index-keyed scheduler designs.

use serde::{Deserialize, Serialize};

/// Maximum number of hardware queues the daemon supports
///
/// Bounds the fixed-size queue-occupancy reply on the wire; configurations
/// with more queues are rejected at startup.
pub const MAX_QUEUES: usize = 8;

/// Number of entries in a kernel feature vector
pub const NUM_FEATURES: usize = 16;

/// Client process identifier
///
/// Assigned by the client (its process id in practice); the daemon only
/// requires it to be unique among concurrently active jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Create a `ClientId` from a u32
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner u32 value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ClientId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a hardware queue in the dispatcher's queue list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueIdx(pub u32);

impl QueueIdx {
    /// Create a `QueueIdx` from a u32
    #[inline]
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Get the index as a usize for slicing
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for QueueIdx {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl std::fmt::Display for QueueIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a predictor's output score vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotIdx(pub u32);

impl SlotIdx {
    /// Create a `SlotIdx` from a u32
    #[inline]
    #[must_use]
    pub const fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Get the index as a usize for slicing
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for SlotIdx {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

/// Broad device class of a hardware queue or prediction slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// CPU package or a compute-unit partition of one
    Cpu,
    /// Discrete or integrated GPU
    Gpu,
}

/// A concrete, possibly partial, slice of a physical device
///
/// In the spirit of OpenCL: a platform, a device on that platform, and the
/// number of compute units in use. Several queues may share the same
/// `(platform, device)` with different unit counts when a device is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAlloc {
    /// Platform index
    pub platform: u8,
    /// Device index within the platform
    pub device: u8,
    /// Compute units granted
    pub compute_units: u16,
}

impl ResourceAlloc {
    /// Create a new allocation triple
    #[must_use]
    pub const fn new(platform: u8, device: u8, compute_units: u16) -> Self {
        Self {
            platform,
            device,
            compute_units,
        }
    }
}

impl std::fmt::Display for ResourceAlloc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({} cu)",
            self.platform, self.device, self.compute_units
        )
    }
}

/// Named indices into [`KernelFeatures::values`]
pub mod feature {
    /// Kernel launch count
    pub const LAUNCHES: usize = 0;
    /// Host/device memory transfer count
    pub const MEM_TRANSFERS: usize = 1;
    /// Total bytes moved by memory transfers
    pub const MEM_TRANSFER_BYTES: usize = 2;
    /// Average thread count per launch
    pub const AVG_THREADS: usize = 3;
    /// Dynamic instruction count
    pub const INSTRUCTIONS: usize = 4;
    /// Arithmetic instruction count
    pub const ARITH_OPS: usize = 5;
    /// Branch count
    pub const BRANCHES: usize = 6;
    /// Divergent branch count
    pub const DIVERGENT_BRANCHES: usize = 7;
    /// Atomic operation count
    pub const ATOMICS: usize = 8;
    /// Global memory fence count
    pub const MEM_FENCES: usize = 9;
    /// Global memory load count
    pub const GLOBAL_LOADS: usize = 10;
    /// Global memory store count
    pub const GLOBAL_STORES: usize = 11;
    /// Local memory load count
    pub const LOCAL_LOADS: usize = 12;
    /// Local memory store count
    pub const LOCAL_STORES: usize = 13;
    /// Global load coalescing ratio
    pub const LOAD_COALESCING: usize = 14;
    /// Global store coalescing ratio
    pub const STORE_COALESCING: usize = 15;
}

/// Static feature vector describing one compute kernel
///
/// The predictor consumes this verbatim; the scheduler itself never
/// interprets individual features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelFeatures {
    /// Kernel identifier (index into the client's kernel table)
    pub kernel: u32,
    /// Feature values, indexed by the [`feature`] constants
    pub values: [f64; NUM_FEATURES],
}

impl KernelFeatures {
    /// Create a feature vector for the given kernel id
    #[must_use]
    pub const fn new(kernel: u32, values: [f64; NUM_FEATURES]) -> Self {
        Self { kernel, values }
    }
}

impl Default for KernelFeatures {
    fn default() -> Self {
        Self {
            kernel: 0,
            values: [0.0; NUM_FEATURES],
        }
    }
}
