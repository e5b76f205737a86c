//! Dichotomous logistic models (1PL, 2PL, 3PL), possibly multidimensional,
//! with optional linear covariate terms in the logit.
//!
//! `P(1 | theta) = c + (1 - c) * sigmoid(sum_i a_i theta_i + sum_j d_j cov_j - b)`

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::intern::{quark, Quark};
use crate::model::{check_resp, check_theta, ResponseModel};
use crate::space::{Dim, DimType, LatentSpace, Point};
use crate::utils::sigmoid;

/// Parameter layout: `[Diff, (Guess,) (Discr.<dim>...,) <covariate>...]`.
pub struct LogisticModel {
    space: Arc<LatentSpace>,
    dims: Vec<Dim>,
    params: Vec<f64>,
    names: Vec<Quark>,
    cov_keys: Vec<Quark>,
    has_guess: bool,
    has_slopes: bool,
}

impl LogisticModel {
    /// 1PL (Rasch): slopes fixed at 1, no guessing parameter.
    pub fn one_param(space: &Arc<LatentSpace>, dims: &[Dim]) -> Result<LogisticModel> {
        Self::build(space, dims, false, false)
    }

    /// 2PL: free slopes (initialized to 1), no guessing parameter.
    pub fn two_param(space: &Arc<LatentSpace>, dims: &[Dim]) -> Result<LogisticModel> {
        Self::build(space, dims, true, false)
    }

    /// 3PL: free slopes and a guessing floor (initialized to 0).
    pub fn three_param(space: &Arc<LatentSpace>, dims: &[Dim]) -> Result<LogisticModel> {
        Self::build(space, dims, true, true)
    }

    fn build(
        space: &Arc<LatentSpace>,
        dims: &[Dim],
        has_slopes: bool,
        has_guess: bool,
    ) -> Result<LogisticModel> {
        for &dim in dims {
            if dim.dim_type() != DimType::Continuous || !space.contains_dim(dim) {
                return Err(CatError::SpaceMismatch(
                    "logistic models require continuous dimensions".into(),
                ));
            }
        }
        let mut params = vec![0.0];
        let mut names = vec![quark("Diff")];
        if has_guess {
            params.push(0.0);
            names.push(quark("Guess"));
        }
        if has_slopes {
            for &dim in dims {
                params.push(1.0);
                names.push(quark(&format!("Discr.{}", space.dim_name(dim))));
            }
        }
        Ok(LogisticModel {
            space: Arc::clone(space),
            dims: dims.to_vec(),
            params,
            names,
            cov_keys: Vec::new(),
            has_guess,
            has_slopes,
        })
    }

    /// Sets the discrimination on the model's `i`-th dimension.
    pub fn set_slope(&mut self, i: usize, a: f64) -> Result<()> {
        if !self.has_slopes {
            return Err(CatError::UnsupportedOperation(
                "1PL slopes are fixed at 1".into(),
            ));
        }
        let offset = self.slope_offset() + i;
        self.set_param(offset, a)
    }

    /// Sets the coefficient of an attached covariate.
    pub fn set_covariate_coef(&mut self, key: Quark, coef: f64) -> Result<()> {
        let pos = self
            .cov_keys
            .iter()
            .position(|&k| k == key)
            .ok_or_else(|| CatError::UnknownCovariate(crate::intern::quark_name(key)))?;
        let offset = self.slope_offset() + self.num_slopes() + pos;
        self.set_param(offset, coef)
    }

    fn slope_offset(&self) -> usize {
        if self.has_guess {
            2
        } else {
            1
        }
    }

    fn num_slopes(&self) -> usize {
        if self.has_slopes {
            self.dims.len()
        } else {
            0
        }
    }

    fn b(&self) -> f64 {
        self.params[0]
    }

    fn c(&self) -> f64 {
        if self.has_guess {
            self.params[1]
        } else {
            0.0
        }
    }

    fn slope(&self, i: usize) -> f64 {
        if self.has_slopes {
            self.params[self.slope_offset() + i]
        } else {
            1.0
        }
    }

    fn cov_coef(&self, j: usize) -> f64 {
        self.params[self.slope_offset() + self.num_slopes() + j]
    }

    /// Logit `sum a_i theta_i + sum d_j cov_j - b`.
    fn logit(&self, theta: &Point, cov: &Covariates) -> Result<f64> {
        let mut z = -self.b();
        for (i, &dim) in self.dims.iter().enumerate() {
            z += self.slope(i) * theta.get_cont(dim)?;
        }
        for (j, &key) in self.cov_keys.iter().enumerate() {
            z += self.cov_coef(j) * cov.get(key);
        }
        Ok(z)
    }

    /// The 2PL part: `P* = sigmoid(logit)`, so `P = c + (1-c) P*`.
    fn p_star(&self, theta: &Point, cov: &Covariates) -> Result<f64> {
        Ok(sigmoid(self.logit(theta, cov)?))
    }
}

impl ResponseModel for LogisticModel {
    fn space(&self) -> &Arc<LatentSpace> {
        &self.space
    }

    fn max_response(&self) -> u8 {
        1
    }

    fn prob(&self, resp: u8, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_resp(self, resp)?;
        check_theta(self, theta, "LogisticModel::prob")?;
        let c = self.c();
        let p = c + (1.0 - c) * self.p_star(theta, cov)?;
        Ok(if resp == 1 { p } else { 1.0 - p })
    }

    /* Let P* be the 2PL part, so P = c + (1-c) P* and Q* = 1 - P*.
     * d[log P, theta_i]          =  a_i (1-c) P* Q* / P
     * d[log Q, theta_i]          = -a_i (1-c) P* Q* / Q
     * d[log P, theta_i, theta_j] =  a_i a_j (1-c) P* Q* (c Q*^2 - P*^2) / P^2
     * d[log Q, theta_i, theta_j] = -a_i a_j (1-c)^2 P* Q*^3 / Q^2
     */
    fn log_lik_dtheta(
        &self,
        resp: u8,
        theta: &Point,
        cov: &Covariates,
        grad: Option<&mut DVector<f64>>,
        hes: Option<&mut DMatrix<f64>>,
        fisher: bool,
    ) -> Result<()> {
        check_resp(self, resp)?;
        check_theta(self, theta, "LogisticModel::log_lik_dtheta")?;
        let c = self.c();
        let p_star = self.p_star(theta, cov)?;
        let q_star = 1.0 - p_star;
        let p = c + (1.0 - c) * p_star;

        let grad_val = if resp == 1 {
            (1.0 - c) * p_star * q_star / p
        } else {
            (c - 1.0) * p_star * q_star / (1.0 - p)
        };
        let mut hes_val = if resp == 1 {
            (1.0 - c) * p_star * q_star * (c * q_star * q_star - p_star * p_star) / (p * p)
        } else {
            -(1.0 - c) * (1.0 - c) * p_star * q_star * q_star * q_star
                / ((1.0 - p) * (1.0 - p))
        };
        if fisher {
            hes_val *= -if resp == 1 { p } else { 1.0 - p };
        }

        if let Some(grad) = grad {
            for (i, &dim) in self.dims.iter().enumerate() {
                grad[dim.index()] += self.slope(i) * grad_val;
            }
        }
        if let Some(hes) = hes {
            for (i, &di) in self.dims.iter().enumerate() {
                for (j, &dj) in self.dims.iter().enumerate() {
                    hes[(di.index(), dj.index())] += self.slope(i) * self.slope(j) * hes_val;
                }
            }
        }
        Ok(())
    }

    fn log_lik_dparam(
        &self,
        resp: u8,
        theta: &Point,
        cov: &Covariates,
        grad: Option<&mut DVector<f64>>,
        hes: Option<&mut DMatrix<f64>>,
    ) -> Result<()> {
        check_resp(self, resp)?;
        check_theta(self, theta, "LogisticModel::log_lik_dparam")?;
        let c = self.c();
        let p_star = self.p_star(theta, cov)?;
        let q_star = 1.0 - p_star;
        let p = c + (1.0 - c) * p_star;

        let (grad_val, hes_val, hes_c_val) = if resp == 1 {
            let g = (1.0 - c) * p_star * q_star / p;
            (
                g,
                g * (c * q_star * q_star - p_star * p_star) / p,
                -p_star * q_star / (p * p),
            )
        } else {
            let g = -(1.0 - c) * p_star * q_star / (1.0 - p);
            (g, g * (1.0 - c) * q_star * q_star / (1.0 - p), 0.0)
        };

        // Predictor value multiplying each slope-like parameter: theta for
        // discriminations, the covariate value for covariate coefficients.
        let mut x = Vec::with_capacity(self.num_slopes() + self.cov_keys.len());
        if self.has_slopes {
            for &dim in &self.dims {
                x.push((self.slope_offset() + x.len(), theta.get_cont(dim)?));
            }
        }
        let cov_offset = self.slope_offset() + self.num_slopes();
        for (j, &key) in self.cov_keys.iter().enumerate() {
            x.push((cov_offset + j, cov.get(key)));
        }

        if let Some(grad) = grad {
            grad[0] += -grad_val;
            if self.has_guess {
                grad[1] += if resp == 1 {
                    q_star / p
                } else {
                    (p_star - 1.0) / (1.0 - p)
                };
            }
            for &(idx, xv) in &x {
                grad[idx] += xv * grad_val;
            }
        }
        if let Some(hes) = hes {
            hes[(0, 0)] += hes_val;
            for &(i, xi) in &x {
                hes[(i, 0)] += -xi * hes_val;
                hes[(0, i)] += -xi * hes_val;
                for &(j, xj) in &x {
                    hes[(i, j)] += xi * xj * hes_val;
                }
            }
            if self.has_guess {
                let denom = if resp == 1 { p * p } else { (1.0 - p) * (1.0 - p) };
                hes[(1, 1)] += -q_star * q_star / denom;
                hes[(0, 1)] += -hes_c_val;
                hes[(1, 0)] += -hes_c_val;
                for &(i, xi) in &x {
                    hes[(i, 1)] += xi * hes_c_val;
                    hes[(1, i)] += xi * hes_c_val;
                }
            }
        }
        Ok(())
    }

    /// |logit|, the distance between the ability and the point of
    /// steepest discrimination.
    fn distance(&self, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_theta(self, theta, "LogisticModel::distance")?;
        Ok(self.logit(theta, cov)?.abs())
    }

    fn num_params(&self) -> usize {
        self.params.len()
    }

    fn param(&self, index: usize) -> Result<f64> {
        self.params
            .get(index)
            .copied()
            .ok_or(CatError::IndexOutOfRange {
                index,
                len: self.params.len(),
            })
    }

    fn set_param(&mut self, index: usize, value: f64) -> Result<()> {
        let len = self.params.len();
        *self
            .params
            .get_mut(index)
            .ok_or(CatError::IndexOutOfRange { index, len })? = value;
        Ok(())
    }

    fn param_key(&self, index: usize) -> Result<Quark> {
        self.names
            .get(index)
            .copied()
            .ok_or(CatError::IndexOutOfRange {
                index,
                len: self.names.len(),
            })
    }

    fn add_covariate(&mut self, key: Quark) -> Result<()> {
        self.cov_keys.push(key);
        self.params.push(0.0);
        self.names.push(key);
        Ok(())
    }

    fn discrimination(&self) -> f64 {
        (0..self.dims.len())
            .map(|i| self.slope(i) * self.slope(i))
            .sum::<f64>()
            .sqrt()
    }

    fn difficulty(&self) -> f64 {
        self.b()
    }
}
