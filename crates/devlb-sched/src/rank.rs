//! Candidate ranking: from score vector to ordered queue list
//!
//! Pure functions over a job's predictions and the slot map. The threshold
//! models "close enough" substitutability between architectures: a
//! candidate need not be the single best predicted device, only acceptably
//! close, which is what lets load spread across heterogeneous hardware.

use crate::slots::SlotMap;
use crate::types::{QueueIdx, SlotIdx};

/// Whether `candidate` is within the performance threshold of `reference`
///
/// `threshold` is the acceptable fractional degradation, e.g. `0.2` accepts
/// any candidate scoring at least 80% of the reference.
#[inline]
#[must_use]
pub fn within_threshold(threshold: f32, reference: f32, candidate: f32) -> bool {
    candidate >= reference - reference * threshold
}

/// The available slot with the highest predicted score
///
/// A slot is available when at least one hardware queue is configured
/// against it. Ties go to the lowest slot index. Returns `None` when no
/// slot is both scored and available.
#[must_use]
pub fn best_slot(predictions: &[f32], slots: &SlotMap) -> Option<(SlotIdx, f32)> {
    let mut best: Option<(SlotIdx, f32)> = None;
    for (i, &score) in predictions.iter().enumerate().take(slots.len()) {
        let slot = SlotIdx::from(i);
        if !slots.is_available(slot) {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((slot, score)),
        }
    }
    best
}

/// Acceptable hardware queues for a job, best first
///
/// Collects every available slot whose score is within threshold of the
/// best slot's, expands each into the queues configured against it, and
/// orders the result by descending slot score (the best slot's queues come
/// first; sibling queues of one slot keep ascending index order).
#[must_use]
pub fn candidates(predictions: &[f32], slots: &SlotMap, threshold: f32) -> Vec<QueueIdx> {
    let Some((best, best_score)) = best_slot(predictions, slots) else {
        return Vec::new();
    };

    let mut ranked: Vec<(SlotIdx, f32)> = vec![(best, best_score)];
    for (i, &score) in predictions.iter().enumerate().take(slots.len()) {
        let slot = SlotIdx::from(i);
        if slot == best || !slots.is_available(slot) {
            continue;
        }
        if within_threshold(threshold, best_score, score) {
            ranked.push((slot, score));
        }
    }

    // Stable sort keeps the best slot ahead of equal scorers and preserves
    // ascending slot order among ties.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    ranked
        .iter()
        .flat_map(|&(slot, _)| slots.queues_for_slot(slot).iter().copied())
        .collect()
}
