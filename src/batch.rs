//! Parallel batch administration.

use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, StandardNormal};
use rand_pcg::Pcg64;
use rayon::prelude::*;

use crate::error::Result;
use crate::examinee::Examinee;
use crate::space::{Dim, LatentSpace, Point};
use crate::test::Test;

/// Administers the test to every examinee in parallel.
///
/// Each examinee gets an independent deterministic stream derived from
/// `seed` and their position, so results are reproducible regardless of
/// scheduling. Shared algorithm state (exposure counters, classification
/// tallies) synchronizes internally.
pub fn administer_batch(test: &Test, examinees: &mut [Examinee], seed: u64) -> Result<()> {
    examinees
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(idx, examinee)| {
            let mut rng = Pcg64::seed_from_u64(seed.wrapping_add(idx as u64));
            test.administer(examinee, &mut rng)
        })
}

/// Generates `n` examinees with random simulated traits: standard-normal
/// continuous dimensions, fair-coin attribute mastery, uniform natural
/// categories.
pub fn spawn_examinees(n: usize, space: &Arc<LatentSpace>, seed: u64) -> Result<Vec<Examinee>> {
    (0..n)
        .map(|idx| {
            let mut rng = Pcg64::seed_from_u64(seed.wrapping_add(idx as u64));
            let mut examinee = Examinee::new(format!("examinee-{}", idx));
            let mut theta = Point::new(space);
            for i in 0..space.num_cont() {
                let draw: f64 = StandardNormal.sample(&mut rng);
                theta.set_cont(Dim::cont(i as u16), draw)?;
            }
            for i in 0..space.num_bin() {
                theta.set_bin(Dim::bin(i as u16), rng.random_bool(0.5))?;
            }
            for i in 0..space.num_nat() {
                let max = space.nat_max(i);
                theta.set_nat(Dim::nat(i as u16), rng.random_range(0..=max))?;
            }
            examinee.set_sim_theta(theta);
            Ok(examinee)
        })
        .collect()
}

/// Like [`spawn_examinees`] with a non-standard normal on the continuous
/// dimensions.
pub fn spawn_examinees_normal(
    n: usize,
    space: &Arc<LatentSpace>,
    mean: f64,
    sd: f64,
    seed: u64,
) -> Result<Vec<Examinee>> {
    let normal = Normal::new(mean, sd)
        .map_err(|_| crate::error::CatError::OutOfRange {
            dim: "normal standard deviation".into(),
            value: sd,
        })?;
    (0..n)
        .map(|idx| {
            let mut rng = Pcg64::seed_from_u64(seed.wrapping_add(idx as u64));
            let mut examinee = Examinee::new(format!("examinee-{}", idx));
            let mut theta = Point::new(space);
            for i in 0..space.num_cont() {
                theta.set_cont(Dim::cont(i as u16), normal.sample(&mut rng))?;
            }
            examinee.set_sim_theta(theta);
            Ok(examinee)
        })
        .collect()
}
