//! Simulated response administration.

use std::sync::Arc;

use rand::Rng;
use rand_pcg::Pcg64;
use tracing::warn;

use crate::administrand::Administrand;
use crate::algorithm::Administer;
use crate::error::{CatError, Result};
use crate::examinee::{sim_key, Examinee};
use crate::intern::{quark_name, Quark};
use crate::test::Test;
use crate::utils::EPSILON;

/// Samples a response from the item's model at the examinee's simulated
/// theta and records it into the history.
pub struct Simulate {
    theta_key: Quark,
}

impl Simulate {
    pub fn new() -> Simulate {
        Simulate {
            theta_key: sim_key(),
        }
    }

    /// Simulates from a different theta track.
    pub fn with_theta_key(mut self, key: Quark) -> Simulate {
        self.theta_key = key;
        self
    }
}

impl Default for Simulate {
    fn default() -> Self {
        Simulate::new()
    }
}

impl Administer for Simulate {
    fn administer(
        &self,
        test: &Test,
        examinee: &mut Examinee,
        item: &Arc<dyn Administrand>,
        rng: &mut Pcg64,
    ) -> Result<u8> {
        let model = item.model(test.model_key()).ok_or_else(|| {
            CatError::UnsupportedOperation(format!(
                "item {} has no model under the test's key",
                item.name()
            ))
        })?;
        let theta = examinee.theta(self.theta_key).ok_or_else(|| {
            CatError::UnsupportedOperation(format!(
                "examinee {} has no theta track {:?}",
                examinee.name(),
                quark_name(self.theta_key)
            ))
        })?;

        // Inverse-CDF walk over the response categories.
        let draw: f64 = rng.random();
        let mut cum = 0.0;
        let mut resp = model.max_response();
        for k in 0..=model.max_response() {
            cum += model.prob(k, theta, examinee.covariates())?;
            if draw < cum {
                resp = k;
                break;
            }
        }
        if cum < 1.0 - EPSILON.sqrt() && draw >= cum {
            warn!(
                item = %item.name(),
                total = cum,
                "model probabilities do not sum to 1, using top category"
            );
        }
        examinee.record(Arc::clone(item), resp)?;
        Ok(resp)
    }
}
