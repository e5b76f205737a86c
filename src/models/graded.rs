//! Samejima's graded response model.
//!
//! Ordered thresholds `b_1 < b_2 < ... < b_max` split the response scale
//! into `max + 1` categories:
//! `P(k) = P*_k - P*_{k+1}` with `P*_k = sigmoid(sum a_i theta_i + covs - b_k)`,
//! `P*_0 = 1`, and `P*_{max+1} = 0`.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::intern::{quark, Quark};
use crate::model::{check_resp, check_theta, ResponseModel};
use crate::space::{Dim, DimType, LatentSpace, Point};
use crate::utils::{sigmoid, EPSILON};

/// Parameter layout: `[Diff.1..Diff.max, Discr.<dim>..., <covariate>...]`.
pub struct GradedModel {
    space: Arc<LatentSpace>,
    dims: Vec<Dim>,
    max: usize,
    params: Vec<f64>,
    names: Vec<Quark>,
    cov_keys: Vec<Quark>,
}

impl GradedModel {
    /// A graded model with `n_cats >= 3` categories and evenly spread
    /// initial thresholds.
    pub fn new(space: &Arc<LatentSpace>, dims: &[Dim], n_cats: usize) -> Result<GradedModel> {
        if n_cats < 3 {
            return Err(CatError::UnsupportedOperation(
                "graded models need at least 3 categories".into(),
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
                    "graded models require continuous dimensions".into(),
                ));
            }
        }
        let max = n_cats - 1;
        let mut params = Vec::with_capacity(max + dims.len());
        let mut names = Vec::with_capacity(max + dims.len());
        for k in 1..=max {
            // Spread initial thresholds around zero, preserving order.
            params.push(k as f64 - (max as f64 + 1.0) / 2.0);
            names.push(quark(&format!("Diff.{}", k)));
        }
        for &dim in dims {
            params.push(1.0);
            names.push(quark(&format!("Discr.{}", space.dim_name(dim))));
        }
        Ok(GradedModel {
            space: Arc::clone(space),
            dims: dims.to_vec(),
            max,
            params,
            names,
            cov_keys: Vec::new(),
        })
    }

    /// Sets threshold `k` (1-based). Callers keep thresholds ordered.
    pub fn set_threshold(&mut self, k: usize, b: f64) -> Result<()> {
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

    fn threshold(&self, k: usize) -> f64 {
        self.params[k - 1]
    }

    fn slope(&self, i: usize) -> f64 {
        self.params[self.max + i]
    }

    fn cov_coef(&self, j: usize) -> f64 {
        self.params[self.max + self.dims.len() + j]
    }

    fn base_logit(&self, theta: &Point, cov: &Covariates) -> Result<f64> {
        let mut z = 0.0;
        for (i, &dim) in self.dims.iter().enumerate() {
            z += self.slope(i) * theta.get_cont(dim)?;
        }
        for (j, &key) in self.cov_keys.iter().enumerate() {
            z += self.cov_coef(j) * cov.get(key);
        }
        Ok(z)
    }

    /// `P*_k` for k in 1..=max; boundaries are handled by callers.
    fn p_star(&self, k: usize, base: f64) -> f64 {
        sigmoid(base - self.threshold(k))
    }
}

impl ResponseModel for GradedModel {
    fn space(&self) -> &Arc<LatentSpace> {
        &self.space
    }

    fn max_response(&self) -> u8 {
        self.max as u8
    }

    fn prob(&self, resp: u8, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_resp(self, resp)?;
        check_theta(self, theta, "GradedModel::prob")?;
        let base = self.base_logit(theta, cov)?;
        let k = resp as usize;
        let upper = if k == 0 { 1.0 } else { self.p_star(k, base) };
        let lower = if k == self.max {
            0.0
        } else {
            self.p_star(k + 1, base)
        };
        Ok(upper - lower)
    }

    /* With u_k = P*_k (1 - P*_k) and w_k = u_k (1 - 2 P*_k):
     * dP/dtheta_i  = a_i (u_k - u_{k+1})
     * d2P/dtheta^2 = a_i a_j (w_k - w_{k+1})
     * d log P = P'/P,  d2 log P = P''/P - (P'/P)^2.
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
        check_theta(self, theta, "GradedModel::log_lik_dtheta")?;
        let base = self.base_logit(theta, cov)?;
        let k = resp as usize;

        let (p_k, u_k, w_k) = if k == 0 {
            (1.0, 0.0, 0.0)
        } else {
            let p = self.p_star(k, base);
            let u = p * (1.0 - p);
            (p, u, u * (1.0 - 2.0 * p))
        };
        let (p_kk, u_kk, w_kk) = if k == self.max {
            (0.0, 0.0, 0.0)
        } else {
            let p = self.p_star(k + 1, base);
            let u = p * (1.0 - p);
            (p, u, u * (1.0 - 2.0 * p))
        };
        // Clamped so extreme theta keeps the gradients finite.
        let p = (p_k - p_kk).max(EPSILON);
        let du = (u_k - u_kk) / p;
        let dw = (w_k - w_kk) / p;
        let hes_base = dw - du * du;
        let inf_factor = if fisher { -p } else { 1.0 };

        if let Some(grad) = grad {
            for (i, &dim) in self.dims.iter().enumerate() {
                grad[dim.index()] += self.slope(i) * du;
            }
        }
        if let Some(hes) = hes {
            for (i, &di) in self.dims.iter().enumerate() {
                for (j, &dj) in self.dims.iter().enumerate() {
                    hes[(di.index(), dj.index())] +=
                        self.slope(i) * self.slope(j) * hes_base * inf_factor;
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
        check_theta(self, theta, "GradedModel::log_lik_dparam")?;
        let base = self.base_logit(theta, cov)?;
        let k = resp as usize;

        let (u_k, w_k) = if k == 0 {
            (0.0, 0.0)
        } else {
            let p = self.p_star(k, base);
            (p * (1.0 - p), p * (1.0 - p) * (1.0 - 2.0 * p))
        };
        let (u_kk, w_kk) = if k == self.max {
            (0.0, 0.0)
        } else {
            let p = self.p_star(k + 1, base);
            (p * (1.0 - p), p * (1.0 - p) * (1.0 - 2.0 * p))
        };
        let p = self.prob(resp, theta, cov)?.max(EPSILON);

        // dP/dparam for every parameter, in layout order.
        let n = self.num_params();
        let mut dp = vec![0.0; n];
        // d2P/dparam^2 terms that are nonzero (threshold diagonals, slope
        // blocks, slope-threshold cross terms).
        if k > 0 {
            dp[k - 1] = -u_k;
        }
        if k < self.max {
            dp[k] = u_kk;
        }
        let mut x = Vec::with_capacity(self.dims.len() + self.cov_keys.len());
        for &dim in &self.dims {
            x.push(theta.get_cont(dim)?);
        }
        for &key in &self.cov_keys {
            x.push(cov.get(key));
        }
        for (i, &xv) in x.iter().enumerate() {
            dp[self.max + i] = xv * (u_k - u_kk);
        }

        if let Some(grad) = grad {
            for (idx, &d) in dp.iter().enumerate() {
                grad[idx] += d / p;
            }
        }
        if let Some(hes) = hes {
            // d2 log P = d2P/P - (dP)(dP)'/P^2
            for a in 0..n {
                for b in 0..n {
                    hes[(a, b)] += -dp[a] * dp[b] / (p * p);
                }
            }
            if k > 0 {
                hes[(k - 1, k - 1)] += w_k / p;
            }
            if k < self.max {
                hes[(k, k)] += -w_kk / p;
            }
            for (i, &xi) in x.iter().enumerate() {
                let pi = self.max + i;
                for (j, &xj) in x.iter().enumerate() {
                    hes[(pi, self.max + j)] += xi * xj * (w_k - w_kk) / p;
                }
                if k > 0 {
                    hes[(pi, k - 1)] += -xi * w_k / p;
                    hes[(k - 1, pi)] += -xi * w_k / p;
                }
                if k < self.max {
                    hes[(pi, k)] += xi * w_kk / p;
                    hes[(k, pi)] += xi * w_kk / p;
                }
            }
        }
        Ok(())
    }

    fn distance(&self, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_theta(self, theta, "GradedModel::distance")?;
        // Distance to the middle of the threshold range.
        let base = self.base_logit(theta, cov)?;
        let mid: f64 = (1..=self.max).map(|k| self.threshold(k)).sum::<f64>() / self.max as f64;
        Ok((base - mid).abs())
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
        (1..=self.max).map(|k| self.threshold(k)).sum::<f64>() / self.max as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> (Arc<LatentSpace>, GradedModel) {
        let space = LatentSpace::unidimensional();
        let mut m = GradedModel::new(&space, &[Dim::cont(0)], 4).unwrap();
        m.set_threshold(1, -1.0).unwrap();
        m.set_threshold(2, 0.2).unwrap();
        m.set_threshold(3, 1.5).unwrap();
        m.set_slope(0, 1.2).unwrap();
        (space, m)
    }

    fn theta_at(space: &Arc<LatentSpace>, t: f64) -> Point {
        let mut p = Point::new(space);
        p.set_cont(Dim::cont(0), t).unwrap();
        p
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (space, m) = model();
        let cov = Covariates::new();
        for t in [-3.0, -0.5, 0.0, 0.7, 2.5] {
            let theta = theta_at(&space, t);
            let total: f64 = (0..=3).map(|r| m.prob(r, &theta, &cov).unwrap()).sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn categories_order_with_theta() {
        let (space, m) = model();
        let cov = Covariates::new();
        // Far below the first threshold, category 0 dominates; far above
        // the last, the top category dominates.
        assert!(m.prob(0, &theta_at(&space, -4.0), &cov).unwrap() > 0.9);
        assert!(m.prob(3, &theta_at(&space, 4.0), &cov).unwrap() > 0.9);
    }

    #[test]
    fn theta_gradient_matches_finite_difference() {
        let (space, m) = model();
        let cov = Covariates::new();
        let h = 1e-6;
        for resp in 0..=3 {
            let ll = |t: f64| m.prob(resp, &theta_at(&space, t), &cov).unwrap().ln();
            let fd = (ll(0.3 + h) - ll(0.3 - h)) / (2.0 * h);
            let mut grad = DVector::zeros(1);
            m.log_lik_dtheta(resp, &theta_at(&space, 0.3), &cov, Some(&mut grad), None, false)
                .unwrap();
            assert_relative_eq!(grad[0], fd, epsilon = 1e-5);

            let fd2 = (ll(0.3 + h) - 2.0 * ll(0.3) + ll(0.3 - h)) / (h * h);
            let mut hes = DMatrix::zeros(1, 1);
            m.log_lik_dtheta(resp, &theta_at(&space, 0.3), &cov, None, Some(&mut hes), false)
                .unwrap();
            assert_relative_eq!(hes[(0, 0)], fd2, epsilon = 1e-3);
        }
    }

    #[test]
    fn fisher_information_nonnegative() {
        let (space, m) = model();
        let cov = Covariates::new();
        for t in [-2.0, 0.0, 2.0] {
            let mut info = DMatrix::zeros(1, 1);
            m.fisher_information(&theta_at(&space, t), &cov, &mut info)
                .unwrap();
            assert!(info[(0, 0)] > 0.0);
        }
    }

    #[test]
    fn gradients_stay_finite_at_extreme_theta() {
        let (space, m) = model();
        let cov = Covariates::new();
        for t in [-40.0, 40.0] {
            let theta = theta_at(&space, t);
            for resp in 0..=3 {
                let mut grad = DVector::zeros(1);
                let mut hes = DMatrix::zeros(1, 1);
                m.log_lik_dtheta(resp, &theta, &cov, Some(&mut grad), Some(&mut hes), false)
                    .unwrap();
                assert!(grad[0].is_finite(), "grad at theta {} resp {}", t, resp);
                assert!(hes[(0, 0)].is_finite());

                let mut pgrad = DVector::zeros(m.num_params());
                m.log_lik_dparam(resp, &theta, &cov, Some(&mut pgrad), None)
                    .unwrap();
                assert!(pgrad.iter().all(|g| g.is_finite()));
            }
        }
    }

    #[test]
    fn category_count_is_bounded_by_response_codes() {
        let space = LatentSpace::unidimensional();
        assert!(GradedModel::new(&space, &[Dim::cont(0)], 256).is_ok());
        assert!(matches!(
            GradedModel::new(&space, &[Dim::cont(0)], 257),
            Err(CatError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn param_gradient_matches_finite_difference() {
        let (space, _) = model();
        let cov = Covariates::new();
        let theta = theta_at(&space, 0.4);
        let h = 1e-6;
        for resp in 0..=3u8 {
            for idx in 0..4 {
                let ll = |delta: f64| {
                    let (_, mut m) = model();
                    let v = m.param(idx).unwrap();
                    m.set_param(idx, v + delta).unwrap();
                    m.prob(resp, &theta, &cov).unwrap().ln()
                };
                let fd = (ll(h) - ll(-h)) / (2.0 * h);
                let (_, m) = model();
                let mut grad = DVector::zeros(m.num_params());
                m.log_lik_dparam(resp, &theta, &cov, Some(&mut grad), None)
                    .unwrap();
                assert_relative_eq!(grad[idx], fd, epsilon = 1e-5);
            }
        }
    }
}
