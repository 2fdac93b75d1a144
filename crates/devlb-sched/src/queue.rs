//! Hardware queues: admission state for one resource partition
//!
//! A queue tracks the jobs running on, and waiting for, one logical device:
//! a whole CPU or GPU, or a compute-unit partition of a CPU. The original
//! design modeled CPU and GPU queues as subclasses whose only difference was
//! the partitioning capability; here that collapses into a single type with
//! a capability flag.

use crate::job::Job;
use crate::types::{ClientId, DeviceKind, ResourceAlloc};
use std::collections::VecDeque;

/// Identity and concurrency limit of one hardware queue
///
/// Loaded once at startup; immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HwQueueConfig {
    /// Platform index
    pub platform: u8,
    /// Device index within the platform
    pub device: u8,
    /// Compute units backing this queue
    pub compute_units: u16,
    /// Maximum concurrently running jobs
    pub max_running: usize,
    /// Device class
    pub kind: DeviceKind,
    /// Whether this queue's device may be subdivided into sibling queues
    #[serde(default)]
    pub dynamic_partitioning: bool,
}

impl HwQueueConfig {
    /// The allocation handed to jobs admitted here
    #[must_use]
    pub const fn alloc(&self) -> ResourceAlloc {
        ResourceAlloc::new(self.platform, self.device, self.compute_units)
    }
}

/// Running/waiting job lists for one resource partition
///
/// All mutation happens through the dispatcher; operations either succeed
/// or report the violated precondition to the caller, never retry.
#[derive(Debug)]
pub struct HwQueue {
    config: HwQueueConfig,
    running: Vec<Job>,
    waiting: VecDeque<Job>,
}

impl HwQueue {
    /// Create an empty queue for the given configuration
    #[must_use]
    pub fn new(config: HwQueueConfig) -> Self {
        Self {
            config,
            running: Vec::new(),
            waiting: VecDeque::new(),
        }
    }

    /// Queue configuration
    #[must_use]
    pub fn config(&self) -> &HwQueueConfig {
        &self.config
    }

    /// The allocation this queue grants
    #[must_use]
    pub fn alloc(&self) -> ResourceAlloc {
        self.config.alloc()
    }

    /// Whether another job may start running here
    #[must_use]
    pub fn can_run(&self) -> bool {
        self.running.len() < self.config.max_running
    }

    /// Whether this queue's device supports subdivision into siblings
    ///
    /// Partitioning is a configuration-time decision; this flag only gates
    /// whether such a configuration is meaningful for the device class.
    #[must_use]
    pub fn can_partition(&self) -> bool {
        match self.config.kind {
            DeviceKind::Cpu => self.config.dynamic_partitioning,
            DeviceKind::Gpu => false,
        }
    }

    /// Number of running jobs
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Number of waiting jobs
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Move a job into the running list
    ///
    /// Stamps the start time and grants this queue's allocation. Callers on
    /// the prediction-driven path must have checked [`can_run`] first;
    /// advisory notifications skip the check deliberately.
    ///
    /// [`can_run`]: HwQueue::can_run
    pub fn admit(&mut self, mut job: Job) -> ResourceAlloc {
        let alloc = self.config.alloc();
        job.alloc = Some(alloc);
        job.mark_started();
        self.running.push(job);
        alloc
    }

    /// Append a job to the waiting list
    pub fn enqueue(&mut self, mut job: Job) {
        job.mark_queued();
        self.waiting.push_back(job);
    }

    /// Whether a job for the given client is running here
    #[must_use]
    pub fn is_running(&self, client: ClientId) -> bool {
        self.running.iter().any(|job| job.client == client)
    }

    /// Remove and return the running job for the given client
    ///
    /// Stamps the finish time. Returns `None` when no such job is running
    /// in this queue.
    pub fn complete(&mut self, client: ClientId) -> Option<Job> {
        let pos = self.running.iter().position(|job| job.client == client)?;
        let mut job = self.running.remove(pos);
        job.mark_finished();
        Some(job)
    }

    /// Remove and return the head of the waiting list
    pub fn dequeue_front(&mut self) -> Option<Job> {
        self.waiting.pop_front()
    }

    /// Remove and return the waiting job at `index`
    ///
    /// Used for cross-queue stealing. Returns `None` when out of range.
    pub fn remove_waiting(&mut self, index: usize) -> Option<Job> {
        self.waiting.remove(index)
    }

    /// Borrow the waiting job at `index`
    #[must_use]
    pub fn waiting_job(&self, index: usize) -> Option<&Job> {
        self.waiting.get(index)
    }

    /// Drop every running and waiting job
    ///
    /// Returns the client ids of all dropped jobs so callers can release
    /// any per-client state tied to them.
    pub fn clear(&mut self) -> Vec<ClientId> {
        let mut dropped = Vec::with_capacity(self.running.len() + self.waiting.len());
        dropped.extend(self.running.drain(..).map(|job| job.client));
        dropped.extend(self.waiting.drain(..).map(|job| job.client));
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_config(max_running: usize) -> HwQueueConfig {
        HwQueueConfig {
            platform: 0,
            device: 0,
            compute_units: 12,
            max_running,
            kind: DeviceKind::Cpu,
            dynamic_partitioning: true,
        }
    }

    fn gpu_config() -> HwQueueConfig {
        HwQueueConfig {
            platform: 1,
            device: 0,
            compute_units: 14,
            max_running: 1,
            kind: DeviceKind::Gpu,
            dynamic_partitioning: false,
        }
    }

    #[test]
    fn can_run_tracks_capacity() {
        let mut queue = HwQueue::new(cpu_config(2));
        assert!(queue.can_run());

        queue.admit(Job::notified(ClientId::new(1)));
        assert!(queue.can_run());

        queue.admit(Job::notified(ClientId::new(2)));
        assert!(!queue.can_run());

        queue.complete(ClientId::new(1)).unwrap();
        assert!(queue.can_run());
    }

    #[test]
    fn partitioning_is_cpu_only() {
        assert!(HwQueue::new(cpu_config(1)).can_partition());
        assert!(!HwQueue::new(gpu_config()).can_partition());

        let mut fixed_cpu = cpu_config(1);
        fixed_cpu.dynamic_partitioning = false;
        assert!(!HwQueue::new(fixed_cpu).can_partition());
    }

    #[test]
    fn admit_grants_queue_alloc() {
        let mut queue = HwQueue::new(gpu_config());
        let alloc = queue.admit(Job::notified(ClientId::new(9)));
        assert_eq!(alloc, ResourceAlloc::new(1, 0, 14));
        assert!(queue.is_running(ClientId::new(9)));
    }

    #[test]
    fn complete_unknown_client_is_none() {
        let mut queue = HwQueue::new(cpu_config(1));
        queue.admit(Job::notified(ClientId::new(1)));
        assert!(queue.complete(ClientId::new(2)).is_none());
        assert_eq!(queue.running_count(), 1);
    }

    #[test]
    fn waiting_list_is_fifo() {
        let mut queue = HwQueue::new(cpu_config(1));
        for id in 1..=3 {
            queue.enqueue(Job::notified(ClientId::new(id)));
        }
        assert_eq!(queue.waiting_count(), 3);
        assert_eq!(queue.dequeue_front().unwrap().client, ClientId::new(1));
        assert_eq!(queue.dequeue_front().unwrap().client, ClientId::new(2));
        assert_eq!(queue.dequeue_front().unwrap().client, ClientId::new(3));
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn remove_waiting_by_position() {
        let mut queue = HwQueue::new(cpu_config(1));
        for id in 1..=3 {
            queue.enqueue(Job::notified(ClientId::new(id)));
        }
        let stolen = queue.remove_waiting(1).unwrap();
        assert_eq!(stolen.client, ClientId::new(2));
        assert_eq!(queue.waiting_count(), 2);
        assert!(queue.remove_waiting(5).is_none());
    }

    #[test]
    fn clear_reports_dropped_clients() {
        let mut queue = HwQueue::new(cpu_config(2));
        queue.admit(Job::notified(ClientId::new(1)));
        queue.enqueue(Job::notified(ClientId::new(2)));

        let dropped = queue.clear();
        assert_eq!(dropped, vec![ClientId::new(1), ClientId::new(2)]);
        assert_eq!(queue.running_count(), 0);
        assert_eq!(queue.waiting_count(), 0);
    }
}
