//! The stateful scheduling core
//!
//! Owns every hardware queue and implements the three externally triggered
//! operations (notify, assign, release) plus queue-size reporting, queue
//! clearing, and the rebalancing hook. All queue mutation happens here, one
//! request at a time; the request loop owns the dispatcher exclusively, so
//! no locking is needed around queue state.

use crate::job::Job;
use crate::predict::Predictor;
use crate::queue::{HwQueue, HwQueueConfig};
use crate::rank;
use crate::slots::{SlotConfig, SlotMap};
use crate::types::{ClientId, KernelFeatures, QueueIdx, ResourceAlloc, MAX_QUEUES};
use crate::{Result, SchedError};
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Result of an assignment request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The job started immediately on the given allocation
    Started(ResourceAlloc),
    /// No candidate had capacity; the job is waiting and the client will be
    /// told its allocation when a freed queue picks it up
    Queued,
}

/// A formerly waiting job that just started running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedJob {
    /// The client owning the job
    pub client: ClientId,
    /// The allocation it was ultimately given, which may differ from the
    /// one it originally targeted
    pub alloc: ResourceAlloc,
}

/// Serving statistics, reported at shutdown
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchStats {
    /// Advisory notifications handled
    pub notifies: u64,
    /// Assignment requests handled (including rejected ones)
    pub assigns: u64,
    /// Kernel-finish releases handled
    pub releases: u64,
    /// Queue-size queries handled
    pub queue_queries: u64,
    /// Queue clears handled
    pub clears: u64,
    /// Total time spent in assignment handling
    pub assign_time: Duration,
    /// Total time spent in release handling
    pub release_time: Duration,
}

/// Owns all hardware queues and drives job placement
pub struct Dispatcher {
    queues: Vec<HwQueue>,
    slots: SlotMap,
    predictor: Box<dyn Predictor>,
    threshold: f32,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Build a dispatcher from validated configuration
    #[must_use]
    pub fn new(
        queue_configs: Vec<HwQueueConfig>,
        slot_configs: Vec<SlotConfig>,
        predictor: Box<dyn Predictor>,
        threshold: f32,
    ) -> Self {
        let slots = SlotMap::build(slot_configs, &queue_configs);
        let queues = queue_configs.into_iter().map(HwQueue::new).collect();
        Self {
            queues,
            slots,
            predictor,
            threshold,
            stats: DispatchStats::default(),
        }
    }

    /// The configured hardware queues, for inspection
    #[must_use]
    pub fn queues(&self) -> &[HwQueue] {
        &self.queues
    }

    /// Serving statistics so far
    #[must_use]
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Record a client-chosen placement
    ///
    /// The client already decided where it will run; this is bookkeeping
    /// only, so the job lands in the running list with no capacity check.
    /// The returned allocation is echoed back as the acknowledgment.
    pub fn notify(&mut self, client: ClientId, alloc: ResourceAlloc) -> Result<ResourceAlloc> {
        self.stats.notifies += 1;

        let Some(queue) = self.queues.iter_mut().find(|q| q.alloc() == alloc) else {
            return Err(SchedError::UnmappedAlloc(alloc));
        };
        let granted = queue.admit(Job::notified(client));
        debug!(%client, alloc = %granted, "notify: job running");
        Ok(granted)
    }

    /// Place a kernel on the best acceptable device, or queue it
    ///
    /// Walks the ranked candidates and starts the job on the first queue
    /// with capacity. When every candidate is full, the job waits on the
    /// least-backlogged sibling of the preferred queue. Prediction failure
    /// rejects the request before any job exists; no queue is touched.
    pub fn assign(&mut self, client: ClientId, features: KernelFeatures) -> Result<AssignOutcome> {
        let begin = Instant::now();
        self.stats.assigns += 1;

        let predictions = self.predictor.predict(&features)?;
        trace!(%client, kernel = features.kernel, ?predictions, "scored kernel");

        let job = Job::new(client, features, predictions);
        let cands = rank::candidates(&job.predictions, &self.slots, self.threshold);
        let Some(&preferred) = cands.first() else {
            return Err(SchedError::NoCandidates(client));
        };

        let outcome = if let Some(&target) = cands
            .iter()
            .find(|&&qi| self.queues[qi.index()].can_run())
        {
            let queue = &mut self.queues[target.index()];
            debug_assert!(queue.can_run(), "admitting into a full queue");
            let alloc = queue.admit(job);
            debug!(%client, queue = %target, alloc = %alloc, "assign: job running");
            AssignOutcome::Started(alloc)
        } else {
            // Queue on the least-loaded sibling of the preferred queue.
            let preferred_alloc = self.queues[preferred.index()].alloc();
            let mut target = preferred;
            let mut shortest = self.queues[preferred.index()].waiting_count();
            for &qi in &cands[1..] {
                if self.queues[qi.index()].alloc() != preferred_alloc {
                    continue;
                }
                let backlog = self.queues[qi.index()].waiting_count();
                if backlog < shortest {
                    target = qi;
                    shortest = backlog;
                }
            }
            self.queues[target.index()].enqueue(job);
            debug!(%client, queue = %target, backlog = shortest + 1, "assign: job queued");
            AssignOutcome::Queued
        };

        self.adjust_queues();
        self.stats.assign_time += begin.elapsed();
        Ok(outcome)
    }

    /// Retire a finished kernel and hand its queue to the next job
    ///
    /// Prefers the freed queue's own backlog; otherwise steals the first
    /// waiting job anywhere whose predicted score on the freed queue is
    /// within threshold of its score on the queue it was waiting for. The
    /// search is first-fit on purpose: low latency beats optimal placement
    /// here. Returns the started job, if any, so the caller can deliver the
    /// deferred start notification.
    pub fn release(&mut self, client: ClientId) -> Result<Option<StartedJob>> {
        let begin = Instant::now();
        self.stats.releases += 1;

        let Some(freed) = (0..self.queues.len()).find(|&q| self.queues[q].is_running(client))
        else {
            return Err(SchedError::UnknownClient(client));
        };
        let finished = self.queues[freed]
            .complete(client)
            .ok_or(SchedError::UnknownClient(client))?;
        debug!(
            %client,
            queue = freed,
            queued_us = finished.queued_duration().unwrap_or_default().as_micros() as u64,
            ran_us = finished.run_duration().unwrap_or_default().as_micros() as u64,
            "job finished"
        );

        // A notify overflow can leave the queue above its limit even after
        // removal; in that case it is still busy and gets no replacement.
        let next = if self.queues[freed].can_run() {
            self.queues[freed]
                .dequeue_front()
                .or_else(|| self.steal_for(freed))
        } else {
            None
        };

        let started = next.map(|job| {
            let queue = &mut self.queues[freed];
            debug_assert!(queue.can_run(), "admitting into a full queue");
            let owner = job.client;
            let alloc = queue.admit(job);
            debug!(client = %owner, queue = freed, alloc = %alloc, "dispatched waiting job");
            StartedJob {
                client: owner,
                alloc,
            }
        });
        if started.is_none() {
            trace!(queue = freed, "queue going idle");
        }

        self.adjust_queues();
        self.stats.release_time += begin.elapsed();
        Ok(started)
    }

    /// Running-job count per configured queue
    ///
    /// Unused slots up to [`MAX_QUEUES`] carry a `-1` sentinel, matching
    /// the fixed-size wire reply.
    pub fn queue_sizes(&mut self) -> [i32; MAX_QUEUES] {
        self.stats.queue_queries += 1;
        let mut sizes = [-1i32; MAX_QUEUES];
        for (slot, queue) in sizes.iter_mut().zip(&self.queues) {
            *slot = queue.running_count() as i32;
        }
        sizes
    }

    /// Drop every running and waiting job in every queue
    ///
    /// Destructive; intended for test and recovery use. Returns the client
    /// ids of all dropped jobs so the caller can release per-client state
    /// (parked reply channels in particular).
    pub fn clear(&mut self) -> Vec<ClientId> {
        self.stats.clears += 1;
        let mut dropped = Vec::new();
        for queue in &mut self.queues {
            dropped.extend(queue.clear());
        }
        info!(dropped = dropped.len(), "cleared all queues");
        dropped
    }

    /// Rebalancing hook, invoked after every assign and release
    ///
    /// Extension point for dynamic queue resizing (splitting or merging
    /// partitions to trade throughput against single-job performance).
    /// Deliberately unimplemented: opportunistic stealing in `release`
    /// covers redistribution, and resizing heuristics remain open design
    /// space.
    fn adjust_queues(&mut self) {
        trace!(queues = %self.occupancy(), "queue occupancy");
    }

    /// First-fit scan of all waiting lists for a job worth moving to `freed`
    fn steal_for(&mut self, freed: usize) -> Option<Job> {
        let mut found = None;
        'scan: for source in 0..self.queues.len() {
            for pos in 0..self.queues[source].waiting_count() {
                let Some(job) = self.queues[source].waiting_job(pos) else {
                    continue;
                };
                let Some(preferred) = self.score_for(job, source) else {
                    warn!(queue = source, "waiting job has no score for its own queue");
                    continue;
                };
                let Some(here) = self.score_for(job, freed) else {
                    continue;
                };
                if rank::within_threshold(self.threshold, preferred, here) {
                    found = Some((source, pos));
                    break 'scan;
                }
            }
        }
        let (source, pos) = found?;
        self.queues[source].remove_waiting(pos)
    }

    /// The job's predicted score for the slot backing `queue`
    fn score_for(&self, job: &Job, queue: usize) -> Option<f32> {
        let slot = self.slots.slot_of_queue(QueueIdx::from(queue))?;
        job.predictions.get(slot.index()).copied()
    }

    /// Human-readable running/waiting counts, one `r/w` pair per queue
    fn occupancy(&self) -> String {
        let mut out = String::new();
        for (i, queue) in self.queues.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{}/{}", queue.running_count(), queue.waiting_count());
        }
        out
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queues", &self.queues.len())
            .field("slots", &self.slots.len())
            .field("predictor", &self.predictor.name())
            .field("threshold", &self.threshold)
            .finish()
    }
}
