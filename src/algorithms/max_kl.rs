//! Kullback-Leibler index item selection.

use rand_pcg::Pcg64;

use crate::algorithm::Select;
use crate::algorithms::chooser::Chooser;
use crate::bitmask::BitMask;
use crate::covariates::Covariates;
use crate::error::{CatError, Result};
use crate::examinee::{est_key, Examinee};
use crate::intern::{quark_name, Quark};
use crate::model::ResponseModel;
use crate::space::{Dim, Point};
use crate::test::Test;

pub const DEFAULT_NEIGHBORHOOD: f64 = 3.0;
pub const DEFAULT_GRID_POINTS: usize = 11;

/// Selects the item with the largest expected Kullback-Leibler
/// discrimination around the current ability estimate.
///
/// For continuous dimensions the index integrates `KL(theta_hat || theta)`
/// over the cube `theta_hat +/- c / sqrt(n)` (`n` items administered so
/// far) by midpoint quadrature; binary attribute dimensions are summed
/// over candidate mastery patterns, optionally weighted.
pub struct MaxKl {
    chooser: Chooser,
    theta_key: Quark,
    /// Half-width coefficient `c` of the integration cube.
    neighborhood: f64,
    grid_points: usize,
    pattern_weights: Option<Vec<f64>>,
}

impl MaxKl {
    pub fn new(num_best: usize) -> MaxKl {
        MaxKl {
            chooser: Chooser::new(num_best),
            theta_key: est_key(),
            neighborhood: DEFAULT_NEIGHBORHOOD,
            grid_points: DEFAULT_GRID_POINTS,
            pattern_weights: None,
        }
    }

    pub fn with_theta_key(mut self, key: Quark) -> MaxKl {
        self.theta_key = key;
        self
    }

    pub fn with_neighborhood(mut self, c: f64) -> MaxKl {
        self.neighborhood = c;
        self
    }

    pub fn with_grid_points(mut self, points: usize) -> MaxKl {
        self.grid_points = points.max(2);
        self
    }

    /// Weights over binary attribute patterns, indexed by the pattern's
    /// little-endian integer encoding.
    pub fn with_pattern_weights(mut self, weights: Vec<f64>) -> MaxKl {
        self.pattern_weights = Some(weights);
        self
    }

    /// `KL(P(.|at) || P(.|probe))` for one item.
    fn kl(
        model: &dyn ResponseModel,
        at: &Point,
        probe: &Point,
        cov: &Covariates,
    ) -> Result<f64> {
        let mut total = 0.0;
        for resp in 0..=model.max_response() {
            let p = model.prob(resp, at, cov)?;
            if p > 0.0 {
                let q = model.prob(resp, probe, cov)?;
                total += p * (p / q).ln();
            }
        }
        Ok(total)
    }

    /// Sums KL over every discrete pattern of `probe` (continuous part
    /// already placed).
    fn sum_patterns(
        &self,
        model: &dyn ResponseModel,
        at: &Point,
        probe: &mut Point,
        cov: &Covariates,
    ) -> Result<f64> {
        let n_bin = at.space().num_bin();
        if n_bin == 0 {
            return Self::kl(model, at, probe, cov);
        }
        if n_bin > 20 {
            return Err(CatError::UnsupportedOperation(format!(
                "pattern summation over {} binary dimensions",
                n_bin
            )));
        }
        let mut total = 0.0;
        for pattern in 0u32..(1 << n_bin) {
            for bit in 0..n_bin {
                probe.set_bin(Dim::bin(bit as u16), pattern & (1 << bit) != 0)?;
            }
            let w = match &self.pattern_weights {
                Some(weights) => weights.get(pattern as usize).copied().unwrap_or(0.0),
                None => 1.0,
            };
            if w > 0.0 {
                total += w * Self::kl(model, at, probe, cov)?;
            }
        }
        Ok(total)
    }

    /// Midpoint quadrature over the continuous cube, recursing one
    /// dimension at a time.
    #[allow(clippy::too_many_arguments)]
    fn integrate(
        &self,
        model: &dyn ResponseModel,
        at: &Point,
        probe: &mut Point,
        cov: &Covariates,
        dim: usize,
        half_width: f64,
        cell: f64,
    ) -> Result<f64> {
        let n_cont = at.space().num_cont();
        if dim == n_cont {
            return Ok(cell * self.sum_patterns(model, at, probe, cov)?);
        }
        let d = Dim::cont(dim as u16);
        let center = at.get_cont(d)?;
        let step = 2.0 * half_width / self.grid_points as f64;
        let mut total = 0.0;
        for g in 0..self.grid_points {
            let x = center - half_width + (g as f64 + 0.5) * step;
            probe.set_cont(d, x)?;
            total += self.integrate(model, at, probe, cov, dim + 1, half_width, cell * step)?;
        }
        Ok(total)
    }

    fn index_for(
        &self,
        model: &dyn ResponseModel,
        at: &Point,
        cov: &Covariates,
        n_administered: usize,
    ) -> Result<f64> {
        let mut probe = at.clone();
        if at.space().num_cont() == 0 {
            return self.sum_patterns(model, at, &mut probe, cov);
        }
        let half_width = self.neighborhood / (n_administered.max(1) as f64).sqrt();
        self.integrate(model, at, &mut probe, cov, 0, half_width, 1.0)
    }
}

impl Select for MaxKl {
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
        let cov = examinee.covariates();
        let n = examinee.num_administered();

        let pick = self.chooser.choose(eligible, test.itermax_select(), rng, |i| {
            match test.bank().item(i)?.model(key) {
                // Chooser minimizes; flip the index.
                Some(model) => Ok(-self.index_for(model.as_ref(), theta, cov, n)?),
                None => Ok(f64::INFINITY),
            }
        })?;
        pick.ok_or(CatError::IndexOutOfRange { index: 0, len: 0 })
    }
}
