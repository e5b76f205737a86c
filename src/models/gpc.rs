//! Generalized partial credit model.
//!
//! Category `k` in `0..=max` carries the cumulative logit
//! `z_k = sum_{v<=k} (sum_i a_i theta_i + covs - b_v)` with `z_0 = 0`,
//! and `P(k) = exp(z_k) / sum_j exp(z_j)`. Adjacent categories differ by
//! one step: `log(P(k)/P(k-1)) = sum_i a_i theta_i + covs - b_k`.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::intern::{quark, Quark};
use crate::model::{check_resp, check_theta, ResponseModel};
use crate::space::{Dim, DimType, LatentSpace, Point};
use crate::utils::logsumexp;

/// Parameter layout: `[Diff.1..Diff.max, Discr.<dim>..., <covariate>...]`.
pub struct PartialCreditModel {
    space: Arc<LatentSpace>,
    dims: Vec<Dim>,
    max: usize,
    params: Vec<f64>,
    names: Vec<Quark>,
    cov_keys: Vec<Quark>,
}

impl PartialCreditModel {
    pub fn new(
        space: &Arc<LatentSpace>,
        dims: &[Dim],
        n_cats: usize,
    ) -> Result<PartialCreditModel> {
        if n_cats < 2 {
            return Err(CatError::UnsupportedOperation(
                "partial credit models need at least 2 categories".into(),
            ));
        }
        if n_cats > u8::MAX as usize + 1 {
            return Err(CatError::UnsupportedOperation(format!(
                "{} categories exceed the response code range",
                n_cats
            )));
        }
        for &dim in dims {
            if dim.dim_type() != DimType::Continuous || !space.contains_dim(dim) {
                return Err(CatError::SpaceMismatch(
                    "partial credit models require continuous dimensions".into(),
                ));
            }
        }
        let max = n_cats - 1;
        let mut params = Vec::with_capacity(max + dims.len());
        let mut names = Vec::with_capacity(max + dims.len());
        for k in 1..=max {
            params.push(0.0);
            names.push(quark(&format!("Diff.{}", k)));
        }
        for &dim in dims {
            params.push(1.0);
            names.push(quark(&format!("Discr.{}", space.dim_name(dim))));
        }
        Ok(PartialCreditModel {
            space: Arc::clone(space),
            dims: dims.to_vec(),
            max,
            params,
            names,
            cov_keys: Vec::new(),
        })
    }

    /// Sets step difficulty `k` (1-based).
    pub fn set_step(&mut self, k: usize, b: f64) -> Result<()> {
        if k == 0 || k > self.max {
            return Err(CatError::IndexOutOfRange {
                index: k,
                len: self.max,
            });
        }
        self.params[k - 1] = b;
        Ok(())
    }

    pub fn set_slope(&mut self, i: usize, a: f64) -> Result<()> {
        self.set_param(self.max + i, a)
    }

    fn step(&self, k: usize) -> f64 {
        self.params[k - 1]
    }

    fn slope(&self, i: usize) -> f64 {
        self.params[self.max + i]
    }

    fn cov_coef(&self, j: usize) -> f64 {
        self.params[self.max + self.dims.len() + j]
    }

    /// The per-step logit `sum a_i theta_i + covs`, before step difficulties.
    fn base(&self, theta: &Point, cov: &Covariates) -> Result<f64> {
        let mut z = 0.0;
        for (i, &dim) in self.dims.iter().enumerate() {
            z += self.slope(i) * theta.get_cont(dim)?;
        }
        for (j, &key) in self.cov_keys.iter().enumerate() {
            z += self.cov_coef(j) * cov.get(key);
        }
        Ok(z)
    }

    /// Cumulative logits for categories 0..=max, with `z_0 = 0`.
    fn logits(&self, theta: &Point, cov: &Covariates) -> Result<Vec<f64>> {
        let base = self.base(theta, cov)?;
        let mut z = Vec::with_capacity(self.max + 1);
        z.push(0.0);
        for k in 1..=self.max {
            z.push(z[k - 1] + base - self.step(k));
        }
        Ok(z)
    }

    fn category_probs(&self, theta: &Point, cov: &Covariates) -> Result<Vec<f64>> {
        let z = self.logits(theta, cov)?;
        let lse = logsumexp(&z);
        Ok(z.iter().map(|zk| (zk - lse).exp()).collect())
    }

    /// Per-category sensitivity of the logits to parameter `index`
    /// (`dz_k / dparam`). Step `v` subtracts from every category at or
    /// above it; slope-like parameters scale with the category score.
    fn param_coefs(&self, index: usize, theta: &Point, cov: &Covariates) -> Result<Vec<f64>> {
        let mut m = vec![0.0; self.max + 1];
        if index < self.max {
            for mk in m.iter_mut().skip(index + 1) {
                *mk = -1.0;
            }
        } else if index < self.max + self.dims.len() {
            let x = theta.get_cont(self.dims[index - self.max])?;
            for (k, mk) in m.iter_mut().enumerate() {
                *mk = k as f64 * x;
            }
        } else {
            let v = cov.get(self.cov_keys[index - self.max - self.dims.len()]);
            for (k, mk) in m.iter_mut().enumerate() {
                *mk = k as f64 * v;
            }
        }
        Ok(m)
    }
}

impl ResponseModel for PartialCreditModel {
    fn space(&self) -> &Arc<LatentSpace> {
        &self.space
    }

    fn max_response(&self) -> u8 {
        self.max as u8
    }

    fn prob(&self, resp: u8, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_resp(self, resp)?;
        check_theta(self, theta, "PartialCreditModel::prob")?;
        Ok(self.category_probs(theta, cov)?[resp as usize])
    }

    /* dz_k/dtheta_i = k a_i, so
     * d log P(r) / dtheta_i = a_i (r - E[k])
     * d2 log P(r) / dtheta_i dtheta_j = -a_i a_j Var(k)
     * under the category distribution.
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
        check_theta(self, theta, "PartialCreditModel::log_lik_dtheta")?;
        let p = self.category_probs(theta, cov)?;
        let r = resp as usize;

        let mean: f64 = (0..=self.max).map(|k| p[k] * k as f64).sum();
        let e2: f64 = (0..=self.max).map(|k| p[k] * (k * k) as f64).sum();
        let var = e2 - mean * mean;

        if let Some(grad) = grad {
            for (i, &dim) in self.dims.iter().enumerate() {
                grad[dim.index()] += self.slope(i) * (r as f64 - mean);
            }
        }
        if let Some(hes) = hes {
            let inf_factor = if fisher { -p[r] } else { 1.0 };
            for (i, &di) in self.dims.iter().enumerate() {
                for (j, &dj) in self.dims.iter().enumerate() {
                    hes[(di.index(), dj.index())] +=
                        -self.slope(i) * self.slope(j) * var * inf_factor;
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
        check_theta(self, theta, "PartialCreditModel::log_lik_dparam")?;
        let p = self.category_probs(theta, cov)?;
        let r = resp as usize;
        let n = self.num_params();

        let mut coefs = Vec::with_capacity(n);
        for idx in 0..n {
            coefs.push(self.param_coefs(idx, theta, cov)?);
        }
        let means: Vec<f64> = coefs
            .iter()
            .map(|m| (0..=self.max).map(|k| p[k] * m[k]).sum())
            .collect();

        if let Some(grad) = grad {
            for idx in 0..n {
                grad[idx] += coefs[idx][r] - means[idx];
            }
        }
        if let Some(hes) = hes {
            for a in 0..n {
                for b in 0..n {
                    let e_ab: f64 =
                        (0..=self.max).map(|k| p[k] * coefs[a][k] * coefs[b][k]).sum();
                    hes[(a, b)] += -(e_ab - means[a] * means[b]);
                }
            }
        }
        Ok(())
    }

    fn distance(&self, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_theta(self, theta, "PartialCreditModel::distance")?;
        let base = self.base(theta, cov)?;
        Ok((base - self.difficulty()).abs())
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
        (1..=self.max).map(|k| self.step(k)).sum::<f64>() / self.max as f64
    }
}
