//! Prediction-slot table and its queue mappings
//!
//! A predictor emits one score per *slot*; a slot names a concrete
//! allocation that one or more hardware queues may be configured against
//! (several identical sibling queues when a device is partitioned). The
//! [`SlotMap`] materializes both directions of that relationship once at
//! startup, replacing the index-aligned parallel arrays of older designs.

use crate::queue::HwQueueConfig;
use crate::types::{DeviceKind, QueueIdx, ResourceAlloc, SlotIdx};

/// One prediction-slot entry: the allocation it scores and its device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SlotConfig {
    /// Platform index
    pub platform: u8,
    /// Device index within the platform
    pub device: u8,
    /// Compute units of the scored configuration
    pub compute_units: u16,
    /// Device class of the slot
    pub kind: DeviceKind,
}

impl SlotConfig {
    /// The allocation this slot scores
    #[must_use]
    pub const fn alloc(&self) -> ResourceAlloc {
        ResourceAlloc::new(self.platform, self.device, self.compute_units)
    }
}

/// Read-only mapping between prediction slots and hardware queues
///
/// Built once from the slot table and the queue configurations; both
/// directions (`slot -> queues`, `queue -> slot`) are precomputed.
#[derive(Debug, Clone)]
pub struct SlotMap {
    slots: Vec<SlotConfig>,
    slot_queues: Vec<Vec<QueueIdx>>,
    queue_slots: Vec<Option<SlotIdx>>,
}

impl SlotMap {
    /// Build the mapping for the given slot table and queue set
    ///
    /// A slot matches a queue when their allocation triples are equal. A
    /// queue whose allocation appears in no slot maps to `None`; startup
    /// validation treats that as a configuration error.
    #[must_use]
    pub fn build(slots: Vec<SlotConfig>, queues: &[HwQueueConfig]) -> Self {
        let slot_queues = slots
            .iter()
            .map(|slot| {
                queues
                    .iter()
                    .enumerate()
                    .filter(|(_, q)| q.alloc() == slot.alloc())
                    .map(|(i, _)| QueueIdx::from(i))
                    .collect()
            })
            .collect();

        let queue_slots = queues
            .iter()
            .map(|q| {
                slots
                    .iter()
                    .position(|slot| slot.alloc() == q.alloc())
                    .map(SlotIdx::from)
            })
            .collect();

        Self {
            slots,
            slot_queues,
            queue_slots,
        }
    }

    /// Number of prediction slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the slot table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot entry at `slot`
    #[must_use]
    pub fn slot(&self, slot: SlotIdx) -> &SlotConfig {
        &self.slots[slot.index()]
    }

    /// Device class of every slot, in slot order
    #[must_use]
    pub fn kinds(&self) -> Vec<DeviceKind> {
        self.slots.iter().map(|slot| slot.kind).collect()
    }

    /// Hardware queues configured against `slot`, ascending by queue index
    #[must_use]
    pub fn queues_for_slot(&self, slot: SlotIdx) -> &[QueueIdx] {
        &self.slot_queues[slot.index()]
    }

    /// The prediction slot scoring `queue`, if any
    #[must_use]
    pub fn slot_of_queue(&self, queue: QueueIdx) -> Option<SlotIdx> {
        self.queue_slots.get(queue.index()).copied().flatten()
    }

    /// Whether at least one queue is configured against `slot`
    #[must_use]
    pub fn is_available(&self, slot: SlotIdx) -> bool {
        !self.slot_queues[slot.index()].is_empty()
    }
}
