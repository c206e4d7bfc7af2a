use rand::Rng;

use crate::config::SelectorConfig;
use crate::models::{PracticeCandidate, StudyItem};

/// Struggle-weighted practice selection.
///
/// Items missed more often are drawn more often, up to a cap. The item
/// shown last is never drawn again immediately unless it is the only one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Selector {
    config: SelectorConfig,
}

impl Selector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn weight(&self, wrong_count: u32) -> f64 {
        let c = &self.config;
        (c.base_weight + c.struggle_per_wrong * wrong_count as f64).min(c.weight_cap)
    }

    pub fn weights(&self, pool: &[PracticeCandidate], last_shown: Option<&StudyItem>) -> Vec<f64> {
        let exclude = if pool.len() > 1 { last_shown } else { None };
        pool.iter()
            .map(|c| {
                if exclude == Some(&c.item) {
                    0.0
                } else {
                    self.weight(c.wrong_count)
                }
            })
            .collect()
    }

    /// Draws the next item. `None` only for an empty pool.
    pub fn select_next<'a, R: Rng + ?Sized>(
        &self,
        pool: &'a [PracticeCandidate],
        last_shown: Option<&StudyItem>,
        rng: &mut R,
    ) -> Option<&'a PracticeCandidate> {
        match pool.len() {
            0 => return None,
            1 => return pool.first(),
            _ => {}
        }

        let weights = self.weights(pool, last_shown);
        let total: f64 = weights.iter().sum();

        if total <= 0.0 {
            // Nothing carries weight; still hand back something other than the last item
            return pool
                .iter()
                .find(|c| Some(&c.item) != last_shown)
                .or_else(|| pool.first());
        }

        let r = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (candidate, weight) in pool.iter().zip(&weights) {
            if *weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            last_positive = Some(candidate);
            if cumulative >= r {
                return Some(candidate);
            }
        }

        // Float rounding can leave r a hair above the final sum
        last_positive
    }
}
