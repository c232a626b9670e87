//! Smooth weighted round-robin selection.
//!
//! Each pick adds every candidate's weight to its running `current_weight`,
//! chooses the largest (first wins ties), then subtracts the total weight from
//! the winner. Over any window of `sum(weights)` picks each server is chosen
//! exactly `weight` times, interleaved rather than in bursts.

use crate::load_balancer::{group::ServerSlot, SelectionPolicy};

/// Smooth weighted round-robin selector.
/// The cursor state lives in the slots, so the selector itself is stateless.
#[derive(Debug, Default)]
pub struct SmoothWeightedRoundRobin;

impl SmoothWeightedRoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionPolicy for SmoothWeightedRoundRobin {
    fn pick(&self, slots: &mut [ServerSlot]) -> Option<usize> {
        let mut total: i64 = 0;
        let mut best: Option<usize> = None;
        let mut best_weight = i64::MIN;

        for (index, slot) in slots.iter_mut().enumerate() {
            let weight = i64::from(slot.server.weight());
            slot.current_weight += weight;
            total += weight;
            if slot.current_weight > best_weight {
                best_weight = slot.current_weight;
                best = Some(index);
            }
        }

        let index = best?;
        slots[index].current_weight -= total;
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::server::{ServerKey, UpstreamServer};
    use std::sync::Arc;

    fn slots(weights: &[u32]) -> Vec<ServerSlot> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| ServerSlot::new(Arc::new(UpstreamServer::new(
                ServerKey::new("10.0.0.1", 8000 + i as u16),
                *w,
            ))))
            .collect()
    }

    #[test]
    fn test_smooth_sequence() {
        let wrr = SmoothWeightedRoundRobin::new();
        let mut s = slots(&[3, 1]);
        let picks: Vec<usize> = (0..4).map(|_| wrr.pick(&mut s).unwrap()).collect();
        assert_eq!(picks, vec![0, 0, 1, 0]);
        // The cycle returns to its starting point.
        assert!(s.iter().all(|slot| slot.current_weight == 0));
    }

    #[test]
    fn test_interleaving() {
        let wrr = SmoothWeightedRoundRobin::new();
        let mut s = slots(&[5, 1, 1]);
        let picks: Vec<usize> = (0..7).map(|_| wrr.pick(&mut s).unwrap()).collect();
        assert_eq!(picks, vec![0, 0, 1, 0, 2, 0, 0]);
    }

    #[test]
    fn test_proportions_over_window() {
        let wrr = SmoothWeightedRoundRobin::new();
        let mut s = slots(&[4, 2, 1]);
        let mut counts = [0usize; 3];
        for _ in 0..70 {
            counts[wrr.pick(&mut s).unwrap()] += 1;
        }
        assert_eq!(counts, [40, 20, 10]);
    }

    #[test]
    fn test_empty() {
        let wrr = SmoothWeightedRoundRobin::new();
        assert!(wrr.pick(&mut []).is_none());
    }
}
