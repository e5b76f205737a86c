//! Polymorphic item response model interface.
//!
//! Every variant evaluates `P(response | theta, covariates)` and its
//! derivatives with respect to theta (for ability estimation) and with
//! respect to its own parameters (for calibration). Gradients and Hessians
//! are sized by the number of continuous dimensions of the model's space
//! and are *added into* the caller's buffers, so per-item contributions
//! accumulate naturally across an administration history.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::intern::Quark;
use crate::space::{LatentSpace, Point};

/// A probabilistic model of one item's response distribution.
pub trait ResponseModel: Send + Sync {
    /// The latent space over which this model is defined.
    fn space(&self) -> &Arc<LatentSpace>;

    /// Valid response codes are `0..=max_response()`.
    fn max_response(&self) -> u8;

    /// `P(resp | theta, covariates)`, in [0, 1]; sums to 1 over all
    /// valid response codes.
    fn prob(&self, resp: u8, theta: &Point, cov: &Covariates) -> Result<f64>;

    /// Adds the gradient (and, if requested, the Hessian) of
    /// `log P(resp | theta)` with respect to the continuous theta
    /// dimensions into `grad`/`hes`. With `fisher` set, the Hessian
    /// contribution is weighted by `-P(resp)` so that summing over all
    /// response codes yields the Fisher information.
    fn log_lik_dtheta(
        &self,
        resp: u8,
        theta: &Point,
        cov: &Covariates,
        grad: Option<&mut DVector<f64>>,
        hes: Option<&mut DMatrix<f64>>,
        fisher: bool,
    ) -> Result<()>;

    /// Adds the gradient (and optional Hessian) of `log P(resp | theta)`
    /// with respect to the model's own parameters into `grad`/`hes`.
    fn log_lik_dparam(
        &self,
        resp: u8,
        theta: &Point,
        cov: &Covariates,
        grad: Option<&mut DVector<f64>>,
        hes: Option<&mut DMatrix<f64>>,
    ) -> Result<()>;

    /// Adds the Fisher information at `theta` into `info`:
    /// `I = E_X[-d2 log P(X) / dtheta dtheta']`, computed as the expected
    /// negative Hessian over all response categories.
    fn fisher_information(
        &self,
        theta: &Point,
        cov: &Covariates,
        info: &mut DMatrix<f64>,
    ) -> Result<()> {
        for resp in 0..=self.max_response() {
            self.log_lik_dtheta(resp, theta, cov, None, Some(info), true)?;
        }
        Ok(())
    }

    /// Model-specific "difficulty vs ability" distance used by
    /// closest-match selection (e.g. |theta - b| for logistic models).
    fn distance(&self, theta: &Point, cov: &Covariates) -> Result<f64>;

    /// Number of parameters.
    fn num_params(&self) -> usize;

    /// Parameter value by position.
    fn param(&self, index: usize) -> Result<f64>;

    /// Sets a parameter by position.
    fn set_param(&mut self, index: usize, value: f64) -> Result<()>;

    /// Interned name of parameter `index`.
    fn param_key(&self, index: usize) -> Result<Quark>;

    /// Parameter value by interned name.
    fn param_by_key(&self, key: Quark) -> Result<f64> {
        for i in 0..self.num_params() {
            if self.param_key(i)? == key {
                return self.param(i);
            }
        }
        Err(CatError::UnknownParameter(crate::intern::quark_name(key)))
    }

    /// Parameter value by name.
    fn param_by_name(&self, name: &str) -> Result<f64> {
        let key = crate::intern::try_quark(name)
            .ok_or_else(|| CatError::UnknownParameter(name.to_owned()))?;
        self.param_by_key(key)
    }

    /// Attaches a covariate term (coefficient parameter initialized to 0).
    /// Cognitive-diagnosis models do not support covariates.
    fn add_covariate(&mut self, key: Quark) -> Result<()>;

    /// Slope-like magnitude used for alpha-stratification.
    fn discrimination(&self) -> f64 {
        1.0
    }

    /// Location-like value used for difficulty blocking.
    fn difficulty(&self) -> f64 {
        0.0
    }
}

/// Verifies that `theta` lives in a space compatible with the model's.
pub(crate) fn check_theta(model: &dyn ResponseModel, theta: &Point, what: &str) -> Result<()> {
    if !theta.space().compatible_with(model.space()) {
        return Err(CatError::SpaceMismatch(what.to_owned()));
    }
    Ok(())
}

/// Verifies a response code against the model's maximum.
pub(crate) fn check_resp(model: &dyn ResponseModel, resp: u8) -> Result<()> {
    if resp > model.max_response() {
        return Err(CatError::InvalidResponse {
            resp,
            max: model.max_response(),
        });
    }
    Ok(())
}
