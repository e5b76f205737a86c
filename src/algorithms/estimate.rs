//! Maximum-likelihood ability estimation.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use rand_pcg::Pcg64;
use tracing::debug;

use crate::administrand::Administrand;
use crate::algorithm::{Administered, Initialize};
use crate::error::{CatError, Result};
use crate::examinee::{est_key, Examinee};
use crate::intern::Quark;
use crate::space::{Dim, LatentSpace, Point};
use crate::test::Test;

pub const DEFAULT_MLE_ITERS: usize = 10;
pub const DEFAULT_MLE_TOL: f64 = 1e-6;

/// Newton-Raphson maximum-likelihood estimator.
///
/// Registered on the initialize and administered phases: it seeds the
/// estimate track at the origin, then refreshes the estimate after every
/// item. Continuous dimensions follow Newton steps on the summed
/// log-likelihood; binary and natural dimensions are searched
/// exhaustively. Non-convergence within `itermax` is not an error: the
/// iterate with the highest log-likelihood seen wins.
pub struct EstimateMle {
    space: Arc<LatentSpace>,
    theta_key: Quark,
    itermax: usize,
    tol: f64,
}

impl EstimateMle {
    pub fn new(space: &Arc<LatentSpace>) -> EstimateMle {
        EstimateMle {
            space: Arc::clone(space),
            theta_key: est_key(),
            itermax: DEFAULT_MLE_ITERS,
            tol: DEFAULT_MLE_TOL,
        }
    }

    pub fn with_theta_key(mut self, key: Quark) -> EstimateMle {
        self.theta_key = key;
        self
    }

    pub fn with_itermax(mut self, itermax: usize) -> EstimateMle {
        self.itermax = itermax.max(1);
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> EstimateMle {
        self.tol = tol;
        self
    }

    /// One full estimate from the current history, starting at `start`.
    pub fn estimate(&self, test: &Test, examinee: &Examinee, start: &Point) -> Result<Point> {
        if examinee.num_administered() == 0 {
            return Ok(start.clone());
        }
        let n_bin = self.space.num_bin();
        let n_nat = self.space.num_nat();
        if n_bin == 0 && n_nat == 0 {
            return self.newton(test, examinee, start.clone());
        }
        if n_bin > 20 {
            return Err(CatError::UnsupportedOperation(format!(
                "exhaustive search over {} binary dimensions",
                n_bin
            )));
        }

        // Enumerate the discrete part; optimize the continuous part
        // within each configuration.
        let mut best: Option<(f64, Point)> = None;
        let mut candidate = start.clone();
        self.search_nat(test, examinee, &mut candidate, 0, n_bin, n_nat, &mut best)?;
        match best {
            Some((_, point)) => Ok(point),
            None => Ok(start.clone()),
        }
    }

    fn search_nat(
        &self,
        test: &Test,
        examinee: &Examinee,
        candidate: &mut Point,
        nat_dim: usize,
        n_bin: usize,
        n_nat: usize,
        best: &mut Option<(f64, Point)>,
    ) -> Result<()> {
        if nat_dim < n_nat {
            for v in 0..=self.space.nat_max(nat_dim) {
                candidate.set_nat(Dim::nat(nat_dim as u16), v)?;
                self.search_nat(test, examinee, candidate, nat_dim + 1, n_bin, n_nat, best)?;
            }
            return Ok(());
        }
        for pattern in 0u32..(1 << n_bin) {
            for bit in 0..n_bin {
                candidate.set_bin(Dim::bin(bit as u16), pattern & (1 << bit) != 0)?;
            }
            let scored = if self.space.num_cont() > 0 {
                self.newton(test, examinee, candidate.clone())?
            } else {
                candidate.clone()
            };
            let ll = examinee.log_lik(&scored, test.model_key())?;
            if best.as_ref().map_or(true, |(b, _)| ll > *b) {
                *best = Some((ll, scored));
            }
        }
        Ok(())
    }

    /// Newton-Raphson over the continuous dimensions, discrete part held
    /// fixed. Returns the best iterate by log-likelihood.
    fn newton(&self, test: &Test, examinee: &Examinee, mut theta: Point) -> Result<Point> {
        let n = self.space.num_cont();
        if n == 0 {
            return Ok(theta);
        }
        let key = test.model_key();
        let cov = examinee.covariates();

        let mut best_ll = examinee.log_lik(&theta, key)?;
        let mut best = theta.clone();
        for iter in 0..self.itermax {
            let mut grad = DVector::zeros(n);
            let mut hes = DMatrix::zeros(n, n);
            for (item, resp) in examinee.history() {
                if let Some(model) = item.model(key) {
                    model.log_lik_dtheta(
                        *resp,
                        &theta,
                        cov,
                        Some(&mut grad),
                        Some(&mut hes),
                        false,
                    )?;
                }
            }
            let delta = match hes.lu().solve(&grad) {
                Some(delta) => delta,
                // A flat or saddle likelihood ends the climb; the best
                // iterate so far stands.
                None => break,
            };
            let step = delta.amax();
            if !step.is_finite() {
                break;
            }
            *theta.cont_mut() -= &delta;
            let ll = examinee.log_lik(&theta, key)?;
            if ll.is_finite() && ll > best_ll {
                best_ll = ll;
                best.copy_from(&theta)?;
            }
            if step <= self.tol {
                debug!(iter, step, "estimate converged");
                break;
            }
        }
        Ok(best)
    }
}

impl Initialize for EstimateMle {
    fn initialize(&self, _test: &Test, examinee: &mut Examinee, _rng: &mut Pcg64) -> Result<()> {
        examinee.set_theta(self.theta_key, Point::new(&self.space));
        Ok(())
    }
}

impl Administered for EstimateMle {
    fn administered(
        &self,
        test: &Test,
        examinee: &mut Examinee,
        _item: &Arc<dyn Administrand>,
        _resp: u8,
        _rng: &mut Pcg64,
    ) -> Result<()> {
        let start = match examinee.theta(self.theta_key) {
            Some(point) => point.clone(),
            None => Point::new(&self.space),
        };
        let updated = self.estimate(test, examinee, &start)?;
        examinee.set_theta(self.theta_key, updated);
        Ok(())
    }
}
