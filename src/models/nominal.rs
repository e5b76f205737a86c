//! Bock's nominal response model.
//!
//! Each non-reference category `k` in `1..=max` carries its own logit
//! `z_k = sum_i a_{k,i} theta_i - b_k + covs`; category 0 is the reference
//! with `z_0 = 0` and `P(k) = exp(z_k) / sum_j exp(z_j)`.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::intern::{quark, Quark};
use crate::model::{check_resp, check_theta, ResponseModel};
use crate::space::{Dim, DimType, LatentSpace, Point};
use crate::utils::logsumexp;

/// Parameter layout: `[Diff.1..Diff.max,
/// Discr.1.<dim>..Discr.max.<dim> per dimension, <covariate>...]`.
/// Covariate coefficients are shared across categories.
pub struct NominalModel {
    space: Arc<LatentSpace>,
    dims: Vec<Dim>,
    max: usize,
    params: Vec<f64>,
    names: Vec<Quark>,
    cov_keys: Vec<Quark>,
}

impl NominalModel {
    pub fn new(space: &Arc<LatentSpace>, dims: &[Dim], n_cats: usize) -> Result<NominalModel> {
        if n_cats < 2 {
            return Err(CatError::UnsupportedOperation(
                "nominal models need at least 2 categories".into(),
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
                    "nominal models require continuous dimensions".into(),
                ));
            }
        }
        let max = n_cats - 1;
        let mut params = Vec::with_capacity(max * (dims.len() + 1));
        let mut names = Vec::with_capacity(max * (dims.len() + 1));
        for k in 1..=max {
            params.push(0.0);
            names.push(quark(&format!("Diff.{}", k)));
        }
        for &dim in dims {
            for k in 1..=max {
                params.push(1.0);
                names.push(quark(&format!("Discr.{}.{}", k, space.dim_name(dim))));
            }
        }
        Ok(NominalModel {
            space: Arc::clone(space),
            dims: dims.to_vec(),
            max,
            params,
            names,
            cov_keys: Vec::new(),
        })
    }

    /// Sets the intercept of category `k` (1-based).
    pub fn set_intercept(&mut self, k: usize, b: f64) -> Result<()> {
        if k == 0 || k > self.max {
            return Err(CatError::IndexOutOfRange {
                index: k,
                len: self.max,
            });
        }
        self.params[k - 1] = b;
        Ok(())
    }

    /// Sets the slope of category `k` on dimension `i`.
    pub fn set_slope(&mut self, k: usize, i: usize, a: f64) -> Result<()> {
        if k == 0 || k > self.max {
            return Err(CatError::IndexOutOfRange {
                index: k,
                len: self.max,
            });
        }
        self.set_param(self.max * (1 + i) + k - 1, a)
    }

    fn intercept(&self, k: usize) -> f64 {
        self.params[k - 1]
    }

    fn slope(&self, k: usize, i: usize) -> f64 {
        self.params[self.max * (1 + i) + k - 1]
    }

    fn cov_coef(&self, j: usize) -> f64 {
        self.params[self.max * (1 + self.dims.len()) + j]
    }

    /// Logits for categories 0..=max, with `z_0 = 0`.
    fn logits(&self, theta: &Point, cov: &Covariates) -> Result<Vec<f64>> {
        let mut c = 0.0;
        for (j, &key) in self.cov_keys.iter().enumerate() {
            c += self.cov_coef(j) * cov.get(key);
        }
        let mut z = Vec::with_capacity(self.max + 1);
        z.push(0.0);
        for k in 1..=self.max {
            let mut zk = c - self.intercept(k);
            for (i, &dim) in self.dims.iter().enumerate() {
                zk += self.slope(k, i) * theta.get_cont(dim)?;
            }
            z.push(zk);
        }
        Ok(z)
    }

    fn category_probs(&self, theta: &Point, cov: &Covariates) -> Result<Vec<f64>> {
        let z = self.logits(theta, cov)?;
        let lse = logsumexp(&z);
        Ok(z.iter().map(|zk| (zk - lse).exp()).collect())
    }

    /// Per-category sensitivity of the logits to parameter `index`
    /// (`dz_k / dparam`, with `z_0` fixed at zero).
    fn param_coefs(&self, index: usize, theta: &Point, cov: &Covariates) -> Result<Vec<f64>> {
        let mut m = vec![0.0; self.max + 1];
        if index < self.max {
            m[index + 1] = -1.0;
        } else if index < self.max * (1 + self.dims.len()) {
            let i = index / self.max - 1;
            let k = index % self.max + 1;
            m[k] = theta.get_cont(self.dims[i])?;
        } else {
            let j = index - self.max * (1 + self.dims.len());
            let v = cov.get(self.cov_keys[j]);
            for mk in m.iter_mut().skip(1) {
                *mk = v;
            }
        }
        Ok(m)
    }
}

impl ResponseModel for NominalModel {
    fn space(&self) -> &Arc<LatentSpace> {
        &self.space
    }

    fn max_response(&self) -> u8 {
        self.max as u8
    }

    fn prob(&self, resp: u8, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_resp(self, resp)?;
        check_theta(self, theta, "NominalModel::prob")?;
        Ok(self.category_probs(theta, cov)?[resp as usize])
    }

    /* d log P(r) / dtheta_i = a_{r,i} - sum_k P(k) a_{k,i}
     * d2 log P(r) / dtheta_i dtheta_j = -Cov_P(a_i, a_j)
     * with a_{0,i} = 0 for the reference category.
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
        check_theta(self, theta, "NominalModel::log_lik_dtheta")?;
        let p = self.category_probs(theta, cov)?;
        let r = resp as usize;

        // Expected slope per dimension under the category distribution.
        let mut mean = vec![0.0; self.dims.len()];
        for (i, m) in mean.iter_mut().enumerate() {
            for k in 1..=self.max {
                *m += p[k] * self.slope(k, i);
            }
        }
        if let Some(grad) = grad {
            for (i, &dim) in self.dims.iter().enumerate() {
                let a_ri = if r == 0 { 0.0 } else { self.slope(r, i) };
                grad[dim.index()] += a_ri - mean[i];
            }
        }
        if let Some(hes) = hes {
            let inf_factor = if fisher { -p[r] } else { 1.0 };
            for (i, &di) in self.dims.iter().enumerate() {
                for (j, &dj) in self.dims.iter().enumerate() {
                    let mut e_ij = 0.0;
                    for k in 1..=self.max {
                        e_ij += p[k] * self.slope(k, i) * self.slope(k, j);
                    }
                    let cov_ij = e_ij - mean[i] * mean[j];
                    hes[(di.index(), dj.index())] += -cov_ij * inf_factor;
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
        check_theta(self, theta, "NominalModel::log_lik_dparam")?;
        let p = self.category_probs(theta, cov)?;
        let r = resp as usize;
        let n = self.num_params();

        // dz_k/dparam vectors; gradient and Hessian follow the same
        // mean/covariance form as the theta derivatives.
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
                    let e_ab: f64 = (0..=self.max).map(|k| p[k] * coefs[a][k] * coefs[b][k]).sum();
                    hes[(a, b)] += -(e_ab - means[a] * means[b]);
                }
            }
        }
        Ok(())
    }

    /// Smallest |logit| over the non-reference categories: how close the
    /// point sits to a boundary with the reference category.
    fn distance(&self, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_theta(self, theta, "NominalModel::distance")?;
        let z = self.logits(theta, cov)?;
        Ok(z[1..]
            .iter()
            .map(|zk| zk.abs())
            .fold(f64::INFINITY, f64::min))
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
        let mut best = 0.0f64;
        for k in 1..=self.max {
            let norm = (0..self.dims.len())
                .map(|i| self.slope(k, i) * self.slope(k, i))
                .sum::<f64>()
                .sqrt();
            best = best.max(norm);
        }
        best
    }

    fn difficulty(&self) -> f64 {
        (1..=self.max).map(|k| self.intercept(k)).sum::<f64>() / self.max as f64
    }
}
