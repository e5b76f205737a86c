//! Standard-error stopping criterion.

use nalgebra::DMatrix;

use crate::algorithm::StopCrit;
use crate::error::{CatError, Result};
use crate::examinee::{est_key, Examinee};
use crate::intern::{quark_name, Quark};
use crate::test::Test;

/// Stops once the standard error of the ability estimate drops below a
/// threshold, with a minimum test length guard.
///
/// The standard error comes from the inverse of the Fisher information
/// summed over the administered items at the current estimate; for
/// multidimensional tests the largest per-dimension standard error must
/// clear the threshold.
pub struct StopOnSe {
    threshold: f64,
    min_items: usize,
    theta_key: Quark,
}

impl StopOnSe {
    pub fn new(threshold: f64, min_items: usize) -> StopOnSe {
        StopOnSe {
            threshold,
            min_items: min_items.max(1),
            theta_key: est_key(),
        }
    }

    pub fn with_theta_key(mut self, key: Quark) -> StopOnSe {
        self.theta_key = key;
        self
    }
}

impl StopCrit for StopOnSe {
    fn stop(&self, test: &Test, examinee: &Examinee) -> Result<bool> {
        if examinee.num_administered() < self.min_items {
            return Ok(false);
        }
        let theta = examinee.theta(self.theta_key).ok_or_else(|| {
            CatError::UnsupportedOperation(format!(
                "examinee {} has no theta track {:?}",
                examinee.name(),
                quark_name(self.theta_key)
            ))
        })?;
        let n = theta.space().num_cont();
        if n == 0 {
            return Err(CatError::UnsupportedOperation(
                "standard-error stopping needs continuous dimensions".into(),
            ));
        }
        let key = test.model_key();
        let mut info = DMatrix::zeros(n, n);
        for (item, _) in examinee.history() {
            if let Some(model) = item.model(key) {
                model.fisher_information(theta, examinee.covariates(), &mut info)?;
            }
        }
        let inv = info
            .try_inverse()
            .ok_or(CatError::SingularMatrix("standard-error stopping"))?;
        let worst_se = (0..n)
            .map(|i| inv[(i, i)].sqrt())
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(worst_se <= self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::administrand::{Administrand, Item};
    use crate::itembank::ItemBank;
    use crate::models::LogisticModel;
    use crate::space::{Dim, LatentSpace, Point};
    use std::sync::Arc;

    #[test]
    fn stops_once_information_accumulates() {
        let space = LatentSpace::unidimensional();
        let mut bank = ItemBank::new("b");
        let mut items: Vec<Arc<dyn Administrand>> = Vec::new();
        for i in 0..20 {
            let mut m = LogisticModel::two_param(&space, &[Dim::cont(0)]).unwrap();
            m.set_slope(0, 1.5).unwrap();
            let item: Arc<dyn Administrand> =
                Arc::new(Item::with_model(format!("q{}", i), Arc::new(m)));
            bank.add_item(Arc::clone(&item));
            items.push(item);
        }
        let test = Test::new("t", Arc::new(bank));

        // a = 1.5 at theta = b gives information 0.5625 per item; SE
        // crosses 0.4 after 12 items.
        let alg = StopOnSe::new(0.4, 3);
        let mut examinee = Examinee::new("e");
        examinee.set_est_theta(Point::new(&space));
        let mut stopped_at = None;
        for (i, item) in items.iter().enumerate() {
            examinee.record(Arc::clone(item), (i % 2) as u8).unwrap();
            if alg.stop(&test, &examinee).unwrap() {
                stopped_at = Some(i + 1);
                break;
            }
        }
        assert_eq!(stopped_at, Some(12));
    }

    #[test]
    fn respects_minimum_length() {
        let space = LatentSpace::unidimensional();
        let mut m = LogisticModel::two_param(&space, &[Dim::cont(0)]).unwrap();
        m.set_slope(0, 10.0).unwrap();
        let item: Arc<dyn Administrand> = Arc::new(Item::with_model("q", Arc::new(m)));
        let mut bank = ItemBank::new("b");
        bank.add_item(Arc::clone(&item));
        let test = Test::new("t", Arc::new(bank));

        let alg = StopOnSe::new(10.0, 2);
        let mut examinee = Examinee::new("e");
        examinee.set_est_theta(Point::new(&space));
        examinee.record(item, 1).unwrap();
        assert!(!alg.stop(&test, &examinee).unwrap());
    }
}
