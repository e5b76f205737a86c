//! Cognitive diagnosis models over binary attribute spaces.
//!
//! Both variants score a dichotomous item against the set of attributes
//! the item requires (the model's dimensions). DINA is all-or-none: an
//! examinee who has mastered every required attribute answers correctly
//! with probability `1 - slip`, anyone else with probability `guess`.
//! NIDA applies slip and guess per attribute and multiplies.
//!
//! Neither variant defines continuous-theta derivatives, a distance
//! metric, or covariate terms; those calls return `UnsupportedOperation`.
//! Discrete ability estimation evaluates `prob` over candidate patterns
//! instead of taking gradients.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::intern::{quark, Quark};
use crate::model::{check_resp, check_theta, ResponseModel};
use crate::space::{Dim, DimType, LatentSpace, Point};

fn check_binary_dims(space: &Arc<LatentSpace>, dims: &[Dim], what: &str) -> Result<()> {
    for &dim in dims {
        if dim.dim_type() != DimType::Binary || !space.contains_dim(dim) {
            return Err(CatError::SpaceMismatch(format!(
                "{} requires binary attribute dimensions",
                what
            )));
        }
    }
    Ok(())
}

/// All-or-none mastery with item-level slip and guess.
pub struct Dina {
    space: Arc<LatentSpace>,
    dims: Vec<Dim>,
    /// `[guess, slip]`
    params: [f64; 2],
    names: [Quark; 2],
}

impl Dina {
    pub fn new(space: &Arc<LatentSpace>, dims: &[Dim]) -> Result<Dina> {
        check_binary_dims(space, dims, "Dina")?;
        Ok(Dina {
            space: Arc::clone(space),
            dims: dims.to_vec(),
            params: [0.2, 0.2],
            names: [quark("Guess"), quark("Slip")],
        })
    }

    pub fn set_guess(&mut self, g: f64) -> Result<()> {
        self.set_param(0, g)
    }

    pub fn set_slip(&mut self, s: f64) -> Result<()> {
        self.set_param(1, s)
    }

    fn mastered(&self, theta: &Point) -> Result<bool> {
        for &dim in &self.dims {
            if !theta.get_bin(dim)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl ResponseModel for Dina {
    fn space(&self) -> &Arc<LatentSpace> {
        &self.space
    }

    fn max_response(&self) -> u8 {
        1
    }

    fn prob(&self, resp: u8, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_resp(self, resp)?;
        check_theta(self, theta, "Dina::prob")?;
        let _ = cov;
        let [guess, slip] = self.params;
        let p = if self.mastered(theta)? { 1.0 - slip } else { guess };
        Ok(if resp == 1 { p } else { 1.0 - p })
    }

    fn log_lik_dtheta(
        &self,
        _resp: u8,
        _theta: &Point,
        _cov: &Covariates,
        _grad: Option<&mut DVector<f64>>,
        _hes: Option<&mut DMatrix<f64>>,
        _fisher: bool,
    ) -> Result<()> {
        Err(CatError::UnsupportedOperation(
            "Dina has no continuous dimensions to differentiate".into(),
        ))
    }

    fn log_lik_dparam(
        &self,
        resp: u8,
        theta: &Point,
        _cov: &Covariates,
        grad: Option<&mut DVector<f64>>,
        hes: Option<&mut DMatrix<f64>>,
    ) -> Result<()> {
        check_resp(self, resp)?;
        check_theta(self, theta, "Dina::log_lik_dparam")?;
        let [guess, slip] = self.params;
        // Per-case d log P for the one parameter P depends on; the other
        // parameter's derivatives are zero.
        let (idx, g) = match (self.mastered(theta)?, resp == 1) {
            (true, true) => (1, 1.0 / (slip - 1.0)),
            (true, false) => (1, 1.0 / slip),
            (false, true) => (0, 1.0 / guess),
            (false, false) => (0, -1.0 / (1.0 - guess)),
        };
        if let Some(grad) = grad {
            grad[idx] += g;
        }
        if let Some(hes) = hes {
            hes[(idx, idx)] += -g * g;
        }
        Ok(())
    }

    fn distance(&self, _theta: &Point, _cov: &Covariates) -> Result<f64> {
        Err(CatError::UnsupportedOperation(
            "Dina does not support distance".into(),
        ))
    }

    fn num_params(&self) -> usize {
        2
    }

    fn param(&self, index: usize) -> Result<f64> {
        self.params
            .get(index)
            .copied()
            .ok_or(CatError::IndexOutOfRange { index, len: 2 })
    }

    fn set_param(&mut self, index: usize, value: f64) -> Result<()> {
        if !(0.0..1.0).contains(&value) {
            return Err(CatError::OutOfRange {
                dim: crate::intern::quark_name(self.param_key(index)?),
                value,
            });
        }
        *self
            .params
            .get_mut(index)
            .ok_or(CatError::IndexOutOfRange { index, len: 2 })? = value;
        Ok(())
    }

    fn param_key(&self, index: usize) -> Result<Quark> {
        self.names
            .get(index)
            .copied()
            .ok_or(CatError::IndexOutOfRange { index, len: 2 })
    }

    fn add_covariate(&mut self, _key: Quark) -> Result<()> {
        Err(CatError::UnsupportedOperation(
            "Dina does not support covariates".into(),
        ))
    }
}

/// Per-attribute slip and guess, combined multiplicatively.
pub struct Nida {
    space: Arc<LatentSpace>,
    dims: Vec<Dim>,
    /// `[Guess.<dim>..., Slip.<dim>...]`
    params: Vec<f64>,
    names: Vec<Quark>,
}

impl Nida {
    pub fn new(space: &Arc<LatentSpace>, dims: &[Dim]) -> Result<Nida> {
        check_binary_dims(space, dims, "Nida")?;
        let n = dims.len();
        let mut names = Vec::with_capacity(2 * n);
        for &dim in dims {
            names.push(quark(&format!("Guess.{}", space.dim_name(dim))));
        }
        for &dim in dims {
            names.push(quark(&format!("Slip.{}", space.dim_name(dim))));
        }
        Ok(Nida {
            space: Arc::clone(space),
            dims: dims.to_vec(),
            params: vec![0.2; 2 * n],
            names,
        })
    }

    pub fn set_guess(&mut self, i: usize, g: f64) -> Result<()> {
        self.set_param(i, g)
    }

    pub fn set_slip(&mut self, i: usize, s: f64) -> Result<()> {
        self.set_param(self.dims.len() + i, s)
    }

    fn guess(&self, i: usize) -> f64 {
        self.params[i]
    }

    fn slip(&self, i: usize) -> f64 {
        self.params[self.dims.len() + i]
    }

    /// Per-attribute success factor at `theta`.
    fn factor(&self, i: usize, theta: &Point) -> Result<f64> {
        Ok(if theta.get_bin(self.dims[i])? {
            1.0 - self.slip(i)
        } else {
            self.guess(i)
        })
    }
}

impl ResponseModel for Nida {
    fn space(&self) -> &Arc<LatentSpace> {
        &self.space
    }

    fn max_response(&self) -> u8 {
        1
    }

    fn prob(&self, resp: u8, theta: &Point, cov: &Covariates) -> Result<f64> {
        check_resp(self, resp)?;
        check_theta(self, theta, "Nida::prob")?;
        let _ = cov;
        let mut p = 1.0;
        for i in 0..self.dims.len() {
            p *= self.factor(i, theta)?;
        }
        Ok(if resp == 1 { p } else { 1.0 - p })
    }

    fn log_lik_dtheta(
        &self,
        _resp: u8,
        _theta: &Point,
        _cov: &Covariates,
        _grad: Option<&mut DVector<f64>>,
        _hes: Option<&mut DMatrix<f64>>,
        _fisher: bool,
    ) -> Result<()> {
        Err(CatError::UnsupportedOperation(
            "Nida has no continuous dimensions to differentiate".into(),
        ))
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
        check_theta(self, theta, "Nida::log_lik_dparam")?;
        let n = self.dims.len();

        // d log f_j / dparam, where f_j is attribute j's success factor.
        // For resp = 1 the log-likelihood separates per attribute; for
        // resp = 0 the chain rule over 1 - prod(f_j) couples them.
        let dlogf = |j: usize| -> Result<(usize, f64)> {
            Ok(if theta.get_bin(self.dims[j])? {
                (n + j, 1.0 / (self.slip(j) - 1.0))
            } else {
                (j, 1.0 / self.guess(j))
            })
        };

        let mut grad = grad;
        let mut hes = hes;
        if resp == 1 {
            for j in 0..n {
                let (idx, g) = dlogf(j)?;
                if let Some(grad) = grad.as_deref_mut() {
                    grad[idx] += g;
                }
                if let Some(hes) = hes.as_deref_mut() {
                    hes[(idx, idx)] += -g * g;
                }
            }
        } else {
            let p = self.prob(1, theta, cov)?;
            let ratio = p / (1.0 - p);
            for j in 0..n {
                let (jdx, gj) = dlogf(j)?;
                // d log(1-p)/dx_j = -ratio * d log f_j / dx_j
                let gv = -ratio * gj;
                if let Some(grad) = grad.as_deref_mut() {
                    grad[jdx] += gv;
                }
                if let Some(hes) = hes.as_deref_mut() {
                    hes[(jdx, jdx)] += -gv * gv;
                    for k in (j + 1)..n {
                        let (kdx, gk) = dlogf(k)?;
                        let hv = -ratio / (1.0 - p) * gj * gk;
                        hes[(jdx, kdx)] += hv;
                        hes[(kdx, jdx)] += hv;
                    }
                }
            }
        }
        Ok(())
    }

    fn distance(&self, _theta: &Point, _cov: &Covariates) -> Result<f64> {
        Err(CatError::UnsupportedOperation(
            "Nida does not support distance".into(),
        ))
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
        if !(0.0..1.0).contains(&value) {
            return Err(CatError::OutOfRange {
                dim: crate::intern::quark_name(self.param_key(index)?),
                value,
            });
        }
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

    fn add_covariate(&mut self, _key: Quark) -> Result<()> {
        Err(CatError::UnsupportedOperation(
            "Nida does not support covariates".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn attr_theta(space: &Arc<LatentSpace>, pattern: &[bool]) -> Point {
        let mut p = Point::new(space);
        for (i, &on) in pattern.iter().enumerate() {
            p.set_bin(Dim::bin(i as u16), on).unwrap();
        }
        p
    }

    #[test]
    fn dina_is_all_or_none() {
        let space = LatentSpace::attributes(3);
        let mut m = Dina::new(&space, &[Dim::bin(0), Dim::bin(2)]).unwrap();
        m.set_guess(0.15).unwrap();
        m.set_slip(0.1).unwrap();
        let cov = Covariates::new();

        let full = attr_theta(&space, &[true, false, true]);
        let partial = attr_theta(&space, &[true, false, false]);
        assert_relative_eq!(m.prob(1, &full, &cov).unwrap(), 0.9);
        assert_relative_eq!(m.prob(1, &partial, &cov).unwrap(), 0.15);
        assert_relative_eq!(m.prob(0, &partial, &cov).unwrap(), 0.85);
    }

    #[test]
    fn nida_multiplies_attribute_factors() {
        let space = LatentSpace::attributes(2);
        let mut m = Nida::new(&space, &[Dim::bin(0), Dim::bin(1)]).unwrap();
        m.set_guess(0, 0.2).unwrap();
        m.set_slip(0, 0.1).unwrap();
        m.set_guess(1, 0.3).unwrap();
        m.set_slip(1, 0.05).unwrap();
        let cov = Covariates::new();

        let theta = attr_theta(&space, &[true, false]);
        assert_relative_eq!(m.prob(1, &theta, &cov).unwrap(), 0.9 * 0.3);
    }

    #[test]
    fn covariates_and_theta_derivatives_unsupported() {
        let space = LatentSpace::attributes(1);
        let mut m = Dina::new(&space, &[Dim::bin(0)]).unwrap();
        assert!(matches!(
            m.add_covariate(quark("age")),
            Err(CatError::UnsupportedOperation(_))
        ));
        let theta = attr_theta(&space, &[true]);
        let cov = Covariates::new();
        assert!(m
            .log_lik_dtheta(1, &theta, &cov, None, None, false)
            .is_err());
        assert!(m.distance(&theta, &cov).is_err());
    }

    #[test]
    fn dina_param_gradient_matches_finite_difference() {
        let space = LatentSpace::attributes(2);
        let cov = Covariates::new();
        let h = 1e-6;
        for pattern in [[true, true], [true, false]] {
            let theta = attr_theta(&space, &pattern);
            for resp in 0..=1u8 {
                for idx in 0..2 {
                    let ll = |delta: f64| {
                        let mut m = Dina::new(&space, &[Dim::bin(0), Dim::bin(1)]).unwrap();
                        m.set_guess(0.2).unwrap();
                        m.set_slip(0.1).unwrap();
                        let v = m.param(idx).unwrap();
                        m.set_param(idx, v + delta).unwrap();
                        m.prob(resp, &theta, &cov).unwrap().ln()
                    };
                    let fd = (ll(h) - ll(-h)) / (2.0 * h);
                    let mut m = Dina::new(&space, &[Dim::bin(0), Dim::bin(1)]).unwrap();
                    m.set_guess(0.2).unwrap();
                    m.set_slip(0.1).unwrap();
                    let mut grad = DVector::zeros(2);
                    m.log_lik_dparam(resp, &theta, &cov, Some(&mut grad), None)
                        .unwrap();
                    assert_relative_eq!(grad[idx], fd, epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn nida_param_gradient_matches_finite_difference() {
        let space = LatentSpace::attributes(2);
        let cov = Covariates::new();
        let dims = [Dim::bin(0), Dim::bin(1)];
        let make = || {
            let mut m = Nida::new(&space, &dims).unwrap();
            m.set_guess(0, 0.25).unwrap();
            m.set_slip(0, 0.1).unwrap();
            m.set_guess(1, 0.3).unwrap();
            m.set_slip(1, 0.15).unwrap();
            m
        };
        let theta = attr_theta(&space, &[true, false]);
        let h = 1e-6;
        for resp in 0..=1u8 {
            for idx in 0..4 {
                let ll = |delta: f64| {
                    let mut m = make();
                    let v = m.param(idx).unwrap();
                    m.set_param(idx, v + delta).unwrap();
                    m.prob(resp, &theta, &cov).unwrap().ln()
                };
                let fd = (ll(h) - ll(-h)) / (2.0 * h);
                let mut grad = DVector::zeros(4);
                make()
                    .log_lik_dparam(resp, &theta, &cov, Some(&mut grad), None)
                    .unwrap();
                assert_relative_eq!(grad[idx], fd, epsilon = 1e-5);
            }
        }
    }
}
