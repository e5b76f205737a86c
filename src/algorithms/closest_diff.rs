//! Closest-difficulty item selection.

use rand_pcg::Pcg64;

use crate::algorithm::Select;
use crate::algorithms::chooser::Chooser;
use crate::bitmask::BitMask;
use crate::error::{CatError, Result};
use crate::examinee::{est_key, Examinee};
use crate::intern::{quark_name, Quark};
use crate::test::Test;

/// Selects the item whose model sits closest to the examinee's current
/// ability, by the model's own distance metric.
pub struct ClosestDiff {
    chooser: Chooser,
    theta_key: Quark,
}

impl ClosestDiff {
    /// `num_best = 1` always takes the closest item; larger values pick
    /// randomly among the `num_best` closest.
    pub fn new(num_best: usize) -> ClosestDiff {
        ClosestDiff {
            chooser: Chooser::new(num_best),
            theta_key: est_key(),
        }
    }

    /// Evaluates distances against a different theta track (e.g. `sim`
    /// for oracle baselines).
    pub fn with_theta_key(mut self, key: Quark) -> ClosestDiff {
        self.theta_key = key;
        self
    }
}

impl Select for ClosestDiff {
    fn select(
        &self,
        test: &Test,
        examinee: &Examinee,
        eligible: &BitMask,
        rng: &mut Pcg64,
    ) -> Result<usize> {
        let theta = examinee.theta(self.theta_key).ok_or_else(|| {
            CatError::UnsupportedOperation(format!(
                "examinee {} has no theta track {:?}",
                examinee.name(),
                quark_name(self.theta_key)
            ))
        })?;
        let key = test.model_key();
        let pick = self.chooser.choose(eligible, test.itermax_select(), rng, |i| {
            match test.bank().item(i)?.model(key) {
                Some(model) => model.distance(theta, examinee.covariates()),
                None => Ok(f64::INFINITY),
            }
        })?;
        pick.ok_or(CatError::IndexOutOfRange { index: 0, len: 0 })
    }
}
