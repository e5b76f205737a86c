//! Examinees: latent trait tracks, covariates, and administration history.

use std::collections::HashMap;
use std::sync::Arc;

use crate::administrand::Administrand;
use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::intern::{quark, Quark};
use crate::space::{LatentSpace, Point};

/// One test taker.
///
/// Trait points live in named tracks: simulation algorithms read the
/// `sim` track, estimators write the `est` track, and callers may keep
/// any number of additional tracks under their own keys. The two common
/// names are ordinary keys with convenience accessors, nothing more.
pub struct Examinee {
    name: String,
    thetas: HashMap<Quark, Point>,
    covariates: Covariates,
    history: Vec<(Arc<dyn Administrand>, u8)>,
}

pub fn sim_key() -> Quark {
    quark("sim")
}

pub fn est_key() -> Quark {
    quark("est")
}

impl Examinee {
    pub fn new(name: impl Into<String>) -> Examinee {
        Examinee {
            name: name.into(),
            thetas: HashMap::new(),
            covariates: Covariates::new(),
            history: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_theta(&mut self, key: Quark, theta: Point) {
        self.thetas.insert(key, theta);
    }

    pub fn theta(&self, key: Quark) -> Option<&Point> {
        self.thetas.get(&key)
    }

    pub fn theta_mut(&mut self, key: Quark) -> Option<&mut Point> {
        self.thetas.get_mut(&key)
    }

    /// Ensures a track exists, initializing it to the origin of `space`.
    pub fn init_theta(&mut self, key: Quark, space: &Arc<LatentSpace>) -> &mut Point {
        self.thetas.entry(key).or_insert_with(|| Point::new(space))
    }

    pub fn set_sim_theta(&mut self, theta: Point) {
        self.set_theta(sim_key(), theta);
    }

    pub fn sim_theta(&self) -> Option<&Point> {
        self.theta(sim_key())
    }

    pub fn set_est_theta(&mut self, theta: Point) {
        self.set_theta(est_key(), theta);
    }

    pub fn est_theta(&self) -> Option<&Point> {
        self.theta(est_key())
    }

    pub fn est_theta_mut(&mut self) -> Option<&mut Point> {
        self.theta_mut(est_key())
    }

    pub fn covariates(&self) -> &Covariates {
        &self.covariates
    }

    pub fn covariates_mut(&mut self) -> &mut Covariates {
        &mut self.covariates
    }

    /// Appends an (item, response) pair after validating the response
    /// against the item's default model.
    pub fn record(&mut self, item: Arc<dyn Administrand>, resp: u8) -> Result<()> {
        if let Some(model) = item.default_model() {
            if resp > model.max_response() {
                return Err(CatError::InvalidResponse {
                    resp,
                    max: model.max_response(),
                });
            }
        }
        self.history.push((item, resp));
        Ok(())
    }

    pub fn num_administered(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[(Arc<dyn Administrand>, u8)] {
        &self.history
    }

    /// Whether `item` already appears in this examinee's history.
    pub fn was_administered(&self, item: &Arc<dyn Administrand>) -> bool {
        self.history.iter().any(|(i, _)| Arc::ptr_eq(i, item))
    }

    /// Clears history for a fresh administration; trait tracks and
    /// covariates persist.
    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// Joint log-likelihood of the recorded responses at `theta`, using
    /// each item's model under `model_key`.
    pub fn log_lik(&self, theta: &Point, model_key: Quark) -> Result<f64> {
        let mut ll = 0.0;
        for (item, resp) in &self.history {
            if let Some(model) = item.model(model_key) {
                ll += model.prob(*resp, theta, &self.covariates)?.ln();
            }
        }
        Ok(ll)
    }
}
