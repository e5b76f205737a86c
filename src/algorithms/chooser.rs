//! Criterion-minimizing item choice shared by the selection algorithms.

use rand::Rng;
use rand_pcg::Pcg64;
use tracing::warn;

use crate::bitmask::BitMask;
use crate::error::Result;

/// Picks the eligible item minimizing a criterion, optionally choosing
/// uniformly among the `num_best` lowest-scoring items for exposure
/// control. Ties keep the lower index.
pub struct Chooser {
    num_best: usize,
}

impl Chooser {
    pub fn new(num_best: usize) -> Chooser {
        Chooser {
            num_best: num_best.max(1),
        }
    }

    pub fn num_best(&self) -> usize {
        self.num_best
    }

    /// Evaluates `criterion` over the eligible items and picks a winner.
    ///
    /// For the randomized variant (`num_best > 1`), at most `max_eval`
    /// candidates are scored; items beyond the cap are ignored with a
    /// warning. Returns `None` when no item is eligible.
    pub fn choose<F>(
        &self,
        eligible: &BitMask,
        max_eval: usize,
        rng: &mut Pcg64,
        mut criterion: F,
    ) -> Result<Option<usize>>
    where
        F: FnMut(usize) -> Result<f64>,
    {
        // (value, index) of the current best candidates, sorted ascending.
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(self.num_best + 1);
        let mut evaluated = 0usize;
        for index in eligible.iter_ones() {
            if self.num_best > 1 && evaluated >= max_eval {
                warn!(
                    cap = max_eval,
                    "candidate evaluation cap reached during randomized selection"
                );
                break;
            }
            let value = criterion(index)?;
            evaluated += 1;
            let pos = best.partition_point(|&(v, _)| v <= value);
            if pos < self.num_best {
                best.insert(pos, (value, index));
                best.truncate(self.num_best);
            }
        }
        if best.is_empty() {
            return Ok(None);
        }
        // Fewer candidates than requested falls back to a uniform draw
        // over what there is.
        let k = rng.random_range(0..best.len());
        Ok(Some(best[k].1))
    }
}
