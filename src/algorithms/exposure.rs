//! Item exposure tracking across a simulation batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand_pcg::Pcg64;

use crate::administrand::Administrand;
use crate::algorithm::{Administered, Finalize};
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::test::Test;

/// Counts how often each item is administered, shared across every
/// examinee run on the test. Counters are atomic so parallel batches
/// need no external locking.
pub struct ExposureCounter {
    counts: Vec<AtomicU64>,
    examinees: AtomicU64,
}

impl ExposureCounter {
    /// A counter sized for a bank of `bank_len` items.
    pub fn new(bank_len: usize) -> ExposureCounter {
        ExposureCounter {
            counts: (0..bank_len).map(|_| AtomicU64::new(0)).collect(),
            examinees: AtomicU64::new(0),
        }
    }

    pub fn count(&self, index: usize) -> Result<u64> {
        self.counts
            .get(index)
            .map(|c| c.load(Ordering::Relaxed))
            .ok_or(CatError::IndexOutOfRange {
                index,
                len: self.counts.len(),
            })
    }

    pub fn num_examinees(&self) -> u64 {
        self.examinees.load(Ordering::Relaxed)
    }

    /// Fraction of examinees who saw item `index`.
    pub fn rate(&self, index: usize) -> Result<f64> {
        let n = self.num_examinees();
        let count = self.count(index)?;
        Ok(if n == 0 { 0.0 } else { count as f64 / n as f64 })
    }

    pub fn rates(&self) -> Vec<f64> {
        let n = self.num_examinees().max(1) as f64;
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed) as f64 / n)
            .collect()
    }

    pub fn reset(&self) {
        for c in &self.counts {
            c.store(0, Ordering::Relaxed);
        }
        self.examinees.store(0, Ordering::Relaxed);
    }

    fn index_of(&self, test: &Test, item: &Arc<dyn Administrand>) -> Option<usize> {
        test.bank().iter().position(|i| Arc::ptr_eq(i, item))
    }
}

impl Administered for ExposureCounter {
    fn administered(
        &self,
        test: &Test,
        _examinee: &mut Examinee,
        item: &Arc<dyn Administrand>,
        _resp: u8,
        _rng: &mut Pcg64,
    ) -> Result<()> {
        if let Some(index) = self.index_of(test, item) {
            self.counts[index].fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

impl Finalize for ExposureCounter {
    fn finalize(&self, _test: &Test, _examinee: &mut Examinee, _rng: &mut Pcg64) -> Result<()> {
        self.examinees.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
