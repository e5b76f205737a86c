//! Attribute classification rates for cognitive diagnosis tests.

use std::collections::HashMap;
use std::sync::Mutex;

use rand_pcg::Pcg64;

use crate::algorithm::Finalize;
use crate::bitmask::BitMask;
use crate::error::{CatError, Result};
use crate::examinee::{est_key, sim_key, Examinee};
use crate::intern::{quark_name, Quark};
use crate::test::Test;

#[derive(Default)]
struct RatesState {
    examinees: u64,
    attr_correct: Vec<u64>,
    pattern_correct: u64,
    /// Histogram over the number of misclassified attributes.
    misclass_hist: Vec<u64>,
    /// True pattern -> (seen, fully correct).
    by_pattern: Option<HashMap<BitMask, (u64, u64)>>,
}

/// Tabulates true-versus-estimated attribute patterns at the end of
/// each administration.
///
/// Shared across the batch; the accumulator is mutex-guarded so parallel
/// examinee runs serialize only on the final tally.
pub struct ClassRates {
    true_key: Quark,
    estimate_key: Quark,
    state: Mutex<RatesState>,
}

impl ClassRates {
    pub fn new() -> ClassRates {
        ClassRates {
            true_key: sim_key(),
            estimate_key: est_key(),
            state: Mutex::new(RatesState::default()),
        }
    }

    /// Also tabulate rates per distinct true pattern.
    pub fn with_by_pattern(self) -> ClassRates {
        self.state.lock().unwrap().by_pattern = Some(HashMap::new());
        self
    }

    pub fn with_keys(mut self, true_key: Quark, estimate_key: Quark) -> ClassRates {
        self.true_key = true_key;
        self.estimate_key = estimate_key;
        self
    }

    pub fn num_examinees(&self) -> u64 {
        self.state.lock().unwrap().examinees
    }

    /// Fraction of examinees whose attribute `i` was classified correctly.
    pub fn attr_rate(&self, i: usize) -> Result<f64> {
        let state = self.state.lock().unwrap();
        let correct = state
            .attr_correct
            .get(i)
            .copied()
            .ok_or(CatError::IndexOutOfRange {
                index: i,
                len: state.attr_correct.len(),
            })?;
        Ok(correct as f64 / state.examinees.max(1) as f64)
    }

    /// Fraction of examinees whose whole pattern was classified correctly.
    pub fn pattern_rate(&self) -> f64 {
        let state = self.state.lock().unwrap();
        state.pattern_correct as f64 / state.examinees.max(1) as f64
    }

    /// Number of examinees with exactly `wrong` misclassified attributes.
    pub fn misclass_count(&self, wrong: usize) -> u64 {
        let state = self.state.lock().unwrap();
        state.misclass_hist.get(wrong).copied().unwrap_or(0)
    }

    /// (seen, fully correct) for a given true pattern, when by-pattern
    /// tabulation is enabled.
    pub fn by_pattern(&self, pattern: &BitMask) -> Option<(u64, u64)> {
        let state = self.state.lock().unwrap();
        state
            .by_pattern
            .as_ref()
            .and_then(|map| map.get(pattern).copied())
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        let by_pattern = state.by_pattern.as_ref().map(|_| HashMap::new());
        *state = RatesState {
            by_pattern,
            ..RatesState::default()
        };
    }

    fn require_theta<'a>(
        &self,
        examinee: &'a Examinee,
        key: Quark,
    ) -> Result<&'a crate::space::Point> {
        examinee.theta(key).ok_or_else(|| {
            CatError::UnsupportedOperation(format!(
                "examinee {} has no theta track {:?}",
                examinee.name(),
                quark_name(key)
            ))
        })
    }
}

impl Default for ClassRates {
    fn default() -> Self {
        ClassRates::new()
    }
}

impl Finalize for ClassRates {
    fn finalize(&self, _test: &Test, examinee: &mut Examinee, _rng: &mut Pcg64) -> Result<()> {
        let truth = self.require_theta(examinee, self.true_key)?;
        let estimate = self.require_theta(examinee, self.estimate_key)?;
        let n_attr = truth.space().num_bin();

        let mut wrong = 0usize;
        let mut correct_bits = vec![false; n_attr];
        for i in 0..n_attr {
            let dim = crate::space::Dim::bin(i as u16);
            if truth.get_bin(dim)? == estimate.get_bin(dim)? {
                correct_bits[i] = true;
            } else {
                wrong += 1;
            }
        }

        let mut state = self.state.lock().unwrap();
        if state.attr_correct.len() < n_attr {
            state.attr_correct.resize(n_attr, 0);
        }
        if state.misclass_hist.len() < n_attr + 1 {
            state.misclass_hist.resize(n_attr + 1, 0);
        }
        state.examinees += 1;
        for (i, &ok) in correct_bits.iter().enumerate() {
            if ok {
                state.attr_correct[i] += 1;
            }
        }
        if wrong == 0 {
            state.pattern_correct += 1;
        }
        state.misclass_hist[wrong] += 1;
        if let Some(map) = state.by_pattern.as_mut() {
            let entry = map.entry(truth.bin_pattern().clone()).or_insert((0, 0));
            entry.0 += 1;
            if wrong == 0 {
                entry.1 += 1;
            }
        }
        Ok(())
    }
}
