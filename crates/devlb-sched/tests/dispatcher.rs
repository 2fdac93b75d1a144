//! Dispatcher scenario tests
//!
//! End-to-end exercises of the scheduling core: capacity and exclusivity
//! invariants, FIFO dispatch, cross-queue stealing, notify bypass, and
//! queue clearing.

use devlb_sched::{
    AssignOutcome, ClientId, DeviceKind, Dispatcher, HwQueueConfig, KernelFeatures, ResourceAlloc,
    ScoreTable, SlotConfig, NUM_FEATURES,
};

fn slot(platform: u8, device: u8, cu: u16, kind: DeviceKind) -> SlotConfig {
    SlotConfig {
        platform,
        device,
        compute_units: cu,
        kind,
    }
}

fn queue(platform: u8, device: u8, cu: u16, max_running: usize, kind: DeviceKind) -> HwQueueConfig {
    HwQueueConfig {
        platform,
        device,
        compute_units: cu,
        max_running,
        kind,
        dynamic_partitioning: false,
    }
}

fn kernel(id: u32) -> KernelFeatures {
    KernelFeatures::new(id, [0.0; NUM_FEATURES])
}

/// One 8-core CPU split into two 4-core siblings, scored by a single slot.
fn sibling_dispatcher() -> Dispatcher {
    let slots = vec![slot(0, 0, 4, DeviceKind::Cpu)];
    let queues = vec![
        queue(0, 0, 4, 1, DeviceKind::Cpu),
        queue(0, 0, 4, 1, DeviceKind::Cpu),
    ];
    let table = ScoreTable::new(1, [(0, vec![10.0])]).unwrap();
    Dispatcher::new(queues, slots, Box::new(table), 0.2)
}

fn total_jobs(disp: &Dispatcher) -> usize {
    disp.queues()
        .iter()
        .map(|q| q.running_count() + q.waiting_count())
        .sum()
}

#[test]
fn capacity_invariant_holds_under_load() {
    let slots = vec![
        slot(0, 0, 12, DeviceKind::Cpu),
        slot(1, 0, 14, DeviceKind::Gpu),
    ];
    let queues = vec![
        queue(0, 0, 12, 2, DeviceKind::Cpu),
        queue(1, 0, 14, 1, DeviceKind::Gpu),
    ];
    let table = ScoreTable::new(2, [(0, vec![10.0, 9.0])]).unwrap();
    let mut disp = Dispatcher::new(queues, slots, Box::new(table), 0.2);

    for id in 0..10 {
        disp.assign(ClientId::new(id), kernel(0)).unwrap();
        for q in disp.queues() {
            assert!(q.running_count() <= q.config().max_running);
        }
    }
    // 2 on the CPU, 1 on the GPU, the rest waiting.
    assert_eq!(disp.queues()[0].running_count(), 2);
    assert_eq!(disp.queues()[1].running_count(), 1);
    assert_eq!(total_jobs(&disp), 10);
}

#[test]
fn every_job_lives_in_exactly_one_queue() {
    let mut disp = sibling_dispatcher();

    for id in 0..6 {
        disp.assign(ClientId::new(id), kernel(0)).unwrap();
        assert_eq!(total_jobs(&disp), id as usize + 1);
    }

    // Releasing moves jobs between lists without duplicating or losing any.
    disp.release(ClientId::new(0)).unwrap();
    assert_eq!(total_jobs(&disp), 5);
    disp.release(ClientId::new(1)).unwrap();
    assert_eq!(total_jobs(&disp), 4);
}

#[test]
fn fifo_dispatch_within_one_queue() {
    let slots = vec![slot(0, 0, 12, DeviceKind::Cpu)];
    let queues = vec![queue(0, 0, 12, 3, DeviceKind::Cpu)];
    let table = ScoreTable::new(1, [(0, vec![10.0])]).unwrap();
    let mut disp = Dispatcher::new(queues, slots, Box::new(table), 0.2);

    // Fill the three running slots, then back up three more.
    for id in 1..=6 {
        disp.assign(ClientId::new(id), kernel(0)).unwrap();
    }
    assert_eq!(disp.queues()[0].waiting_count(), 3);

    for (finished, expected_next) in [(1u32, 4u32), (2, 5), (3, 6)] {
        let started = disp.release(ClientId::new(finished)).unwrap().unwrap();
        assert_eq!(started.client, ClientId::new(expected_next));
    }
    assert_eq!(disp.queues()[0].waiting_count(), 0);
}

#[test]
fn stealing_moves_sibling_backlog_to_freed_partition() {
    let mut disp = sibling_dispatcher();

    // Fill both siblings, then back one job up behind each.
    assert!(matches!(
        disp.assign(ClientId::new(1), kernel(0)).unwrap(),
        AssignOutcome::Started(_)
    ));
    assert!(matches!(
        disp.assign(ClientId::new(2), kernel(0)).unwrap(),
        AssignOutcome::Started(_)
    ));
    disp.assign(ClientId::new(3), kernel(0)).unwrap();
    disp.assign(ClientId::new(4), kernel(0)).unwrap();
    assert_eq!(disp.queues()[0].waiting_count(), 1);
    assert_eq!(disp.queues()[1].waiting_count(), 1);

    // First release drains queue 0's own backlog.
    let started = disp.release(ClientId::new(1)).unwrap().unwrap();
    assert_eq!(started.client, ClientId::new(3));

    // Second release finds queue 0 idle with no local backlog; the sibling's
    // waiting job must be stolen and started, not left behind.
    let started = disp.release(ClientId::new(3)).unwrap().unwrap();
    assert_eq!(started.client, ClientId::new(4));
    assert_eq!(started.alloc, ResourceAlloc::new(0, 0, 4));
    assert_eq!(disp.queues()[1].waiting_count(), 0);
    assert!(disp.queues()[0].is_running(ClientId::new(4)));
}

#[test]
fn stealing_respects_the_threshold() {
    // CPU and GPU with distinct scores: kernel 1 tolerates the CPU, kernel
    // 2 does not.
    let slots = vec![
        slot(0, 0, 12, DeviceKind::Cpu),
        slot(1, 0, 14, DeviceKind::Gpu),
    ];
    let queues = vec![
        queue(0, 0, 12, 1, DeviceKind::Cpu),
        queue(1, 0, 14, 1, DeviceKind::Gpu),
    ];
    let table = ScoreTable::new(
        2,
        [
            (0, vec![10.0, 1.0]),  // CPU-bound filler
            (1, vec![9.0, 10.0]),  // GPU-preferring, CPU acceptable
            (2, vec![1.0, 10.0]),  // GPU-only
        ],
    )
    .unwrap();
    let mut disp = Dispatcher::new(queues, slots, Box::new(table), 0.2);

    disp.assign(ClientId::new(1), kernel(0)).unwrap(); // runs on CPU
    disp.assign(ClientId::new(2), kernel(2)).unwrap(); // runs on GPU
    disp.assign(ClientId::new(3), kernel(2)).unwrap(); // waits on GPU, CPU unacceptable
    disp.assign(ClientId::new(4), kernel(1)).unwrap(); // waits on GPU, CPU acceptable

    // CPU frees: client 3 is ahead in the scan but outside threshold for
    // the CPU; client 4 is the first acceptable steal.
    let started = disp.release(ClientId::new(1)).unwrap().unwrap();
    assert_eq!(started.client, ClientId::new(4));
    assert_eq!(started.alloc, ResourceAlloc::new(0, 0, 12));

    // Client 3 keeps waiting for the GPU.
    assert_eq!(disp.queues()[1].waiting_count(), 1);
    let started = disp.release(ClientId::new(2)).unwrap().unwrap();
    assert_eq!(started.client, ClientId::new(3));
    assert_eq!(started.alloc, ResourceAlloc::new(1, 0, 14));
}

#[test]
fn notify_bypasses_capacity() {
    let mut disp = sibling_dispatcher();

    disp.assign(ClientId::new(1), kernel(0)).unwrap();
    assert!(!disp.queues()[0].can_run());

    // Advisory placement ignores the concurrency limit.
    let alloc = disp
        .notify(ClientId::new(2), ResourceAlloc::new(0, 0, 4))
        .unwrap();
    assert_eq!(alloc, ResourceAlloc::new(0, 0, 4));
    assert_eq!(disp.queues()[0].running_count(), 2);
}

#[test]
fn clear_leaves_no_jobs_anywhere() {
    let mut disp = sibling_dispatcher();
    for id in 0..5 {
        disp.assign(ClientId::new(id), kernel(0)).unwrap();
    }
    disp.notify(ClientId::new(10), ResourceAlloc::new(0, 0, 4))
        .unwrap();

    let mut dropped = disp.clear();
    dropped.sort_by_key(|c| c.get());
    assert_eq!(dropped.len(), 6);
    assert_eq!(dropped.last().copied(), Some(ClientId::new(10)));

    for q in disp.queues() {
        assert_eq!(q.running_count(), 0);
        assert_eq!(q.waiting_count(), 0);
    }

    // The dispatcher keeps serving after a clear.
    assert!(matches!(
        disp.assign(ClientId::new(20), kernel(0)).unwrap(),
        AssignOutcome::Started(_)
    ));
}

#[test]
fn deferred_start_may_change_allocation() {
    // The stolen job's start notification carries the queue it actually
    // got, not the one it originally targeted.
    let slots = vec![
        slot(0, 0, 12, DeviceKind::Cpu),
        slot(1, 0, 14, DeviceKind::Gpu),
    ];
    let queues = vec![
        queue(0, 0, 12, 1, DeviceKind::Cpu),
        queue(1, 0, 14, 1, DeviceKind::Gpu),
    ];
    let table = ScoreTable::new(2, [(0, vec![10.0, 1.0]), (1, vec![9.0, 10.0])]).unwrap();
    let mut disp = Dispatcher::new(queues, slots, Box::new(table), 0.2);

    disp.assign(ClientId::new(1), kernel(0)).unwrap();
    disp.assign(ClientId::new(2), kernel(1)).unwrap();
    assert_eq!(
        disp.assign(ClientId::new(3), kernel(1)).unwrap(),
        AssignOutcome::Queued
    );

    let started = disp.release(ClientId::new(1)).unwrap().unwrap();
    assert_eq!(started.client, ClientId::new(3));
    assert_eq!(started.alloc, ResourceAlloc::new(0, 0, 12));
}
