//! Uniform random item selection.

use rand::Rng;
use rand_pcg::Pcg64;

use crate::algorithm::Select;
use crate::bitmask::BitMask;
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::test::Test;

/// Draws uniformly over the eligible items.
#[derive(Default)]
pub struct PickRand;

impl PickRand {
    pub fn new() -> PickRand {
        PickRand
    }
}

impl Select for PickRand {
    fn select(
        &self,
        _test: &Test,
        _examinee: &Examinee,
        eligible: &BitMask,
        rng: &mut Pcg64,
    ) -> Result<usize> {
        let n = eligible.count();
        if n == 0 {
            return Err(CatError::IndexOutOfRange { index: 0, len: 0 });
        }
        let k = rng.random_range(0..n);
        eligible
            .iter_ones()
            .nth(k)
            .ok_or(CatError::IndexOutOfRange { index: k, len: n })
    }
}
