//! Alpha-stratified item eligibility with optional difficulty blocking.

use std::sync::RwLock;

use tracing::debug;

use crate::algorithm::Filter;
use crate::bitmask::BitMask;
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::test::Test;

/// Partitions the bank into strata of increasing discrimination and
/// restricts each administration position to its scheduled stratum.
///
/// Low-discrimination items are spent early, saving the sharpest items
/// for when the estimate is already close. With `b`-blocking the bank is
/// first sliced into difficulty blocks and each block contributes evenly
/// to every stratum, decoupling the discrimination split from the
/// difficulty distribution.
///
/// The partition is computed on first use and only changes on an explicit
/// [`AStratify::restratify`], which must not run concurrently with
/// administrations on the same test.
pub struct AStratify {
    n_strata: usize,
    n_blocks: usize,
    /// Items to administer from each stratum before moving on; empty
    /// means divide the test length hint evenly.
    schedule: Vec<usize>,
    strata: RwLock<Vec<BitMask>>,
}

impl AStratify {
    pub fn new(n_strata: usize) -> AStratify {
        AStratify {
            n_strata: n_strata.max(1),
            n_blocks: 0,
            schedule: Vec::new(),
            strata: RwLock::new(Vec::new()),
        }
    }

    /// Enables b-blocking with `n_blocks` difficulty blocks.
    pub fn with_blocking(mut self, n_blocks: usize) -> AStratify {
        self.n_blocks = n_blocks;
        self
    }

    /// Explicit per-stratum administration counts.
    pub fn with_schedule(mut self, schedule: Vec<usize>) -> AStratify {
        self.schedule = schedule;
        self
    }

    /// Recomputes the partition from the bank's current parameters.
    pub fn restratify(&self, test: &Test) -> Result<()> {
        let bank = test.bank();
        let key = test.model_key();
        let mut scored: Vec<(usize, f64, f64)> = Vec::with_capacity(bank.len());
        for (i, item) in bank.iter().enumerate() {
            let model = item.model(key).ok_or_else(|| {
                CatError::UnsupportedOperation(format!(
                    "item {} has no model to stratify on",
                    item.name()
                ))
            })?;
            scored.push((i, model.discrimination(), model.difficulty()));
        }

        let mut strata = vec![BitMask::new(bank.len()); self.n_strata];
        if self.n_blocks > 1 {
            scored.sort_by(|x, y| x.2.partial_cmp(&y.2).unwrap_or(std::cmp::Ordering::Equal));
            for block in chunk_evenly(&scored, self.n_blocks) {
                let mut block = block.to_vec();
                block.sort_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal));
                for (s, chunk) in chunk_evenly(&block, self.n_strata).enumerate() {
                    for &(i, _, _) in chunk {
                        strata[s].set(i);
                    }
                }
            }
        } else {
            scored.sort_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal));
            for (s, chunk) in chunk_evenly(&scored, self.n_strata).enumerate() {
                for &(i, _, _) in chunk {
                    strata[s].set(i);
                }
            }
        }
        debug!(
            strata = self.n_strata,
            blocks = self.n_blocks,
            items = bank.len(),
            "stratified item bank"
        );
        *self.strata.write().unwrap() = strata;
        Ok(())
    }

    /// Current stratum membership masks, for inspection.
    pub fn strata(&self) -> Vec<BitMask> {
        self.strata.read().unwrap().clone()
    }

    /// Stratum scheduled for administration position `position`.
    fn stratum_for(&self, test: &Test, position: usize) -> usize {
        if self.schedule.is_empty() {
            let length = test.length_hint().unwrap_or(self.n_strata);
            let per = (length / self.n_strata).max(1);
            (position / per).min(self.n_strata - 1)
        } else {
            let mut cum = 0;
            for (s, &count) in self.schedule.iter().enumerate() {
                cum += count;
                if position < cum {
                    return s;
                }
            }
            self.n_strata - 1
        }
    }
}

impl Filter for AStratify {
    fn filter(&self, test: &Test, examinee: &Examinee, eligible: &mut BitMask) -> Result<()> {
        if self.strata.read().unwrap().is_empty() {
            self.restratify(test)?;
        }
        let s = self.stratum_for(test, examinee.num_administered());
        let strata = self.strata.read().unwrap();
        eligible.intersect(&strata[s]);
        Ok(())
    }
}

/// Splits `items` into `n` contiguous chunks whose sizes differ by at
/// most one, the earlier chunks taking the remainder.
fn chunk_evenly<T>(items: &[T], n: usize) -> impl Iterator<Item = &[T]> {
    let base = items.len() / n;
    let rem = items.len() % n;
    let mut start = 0;
    (0..n).map(move |k| {
        let size = base + usize::from(k < rem);
        let chunk = &items[start..start + size];
        start += size;
        chunk
    })
}
