//! Maximum Fisher information item selection.

use nalgebra::DMatrix;
use rand_pcg::Pcg64;

use crate::algorithm::Select;
use crate::algorithms::chooser::Chooser;
use crate::bitmask::BitMask;
use crate::error::{CatError, Result};
use crate::examinee::{est_key, Examinee};
use crate::intern::{quark_name, Quark};
use crate::test::Test;

/// Multidimensional objective over the summed information matrix.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FisherObjective {
    /// Maximize the determinant of the summed information.
    DOptimality,
    /// Minimize the trace of the inverse of the summed information.
    AOptimality,
}

/// Selects the item adding the most Fisher information at the current
/// ability estimate.
///
/// The information already collected from administered items is summed
/// into a base matrix each call, so the criterion scores the *total*
/// information after the candidate. Unidimensional tests reduce to the
/// scalar information and skip the matrix objective.
pub struct MaxFisher {
    chooser: Chooser,
    theta_key: Quark,
    objective: FisherObjective,
}

impl MaxFisher {
    pub fn new(num_best: usize) -> MaxFisher {
        MaxFisher {
            chooser: Chooser::new(num_best),
            theta_key: est_key(),
            objective: FisherObjective::DOptimality,
        }
    }

    pub fn with_objective(mut self, objective: FisherObjective) -> MaxFisher {
        self.objective = objective;
        self
    }

    pub fn with_theta_key(mut self, key: Quark) -> MaxFisher {
        self.theta_key = key;
        self
    }
}

impl Select for MaxFisher {
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
        let n = theta.space().num_cont();
        if n == 0 {
            return Err(CatError::UnsupportedOperation(
                "Fisher information needs continuous dimensions".into(),
            ));
        }
        let key = test.model_key();
        let cov = examinee.covariates();

        let mut base = DMatrix::zeros(n, n);
        for (item, _) in examinee.history() {
            if let Some(model) = item.model(key) {
                model.fisher_information(theta, cov, &mut base)?;
            }
        }

        let pick = self.chooser.choose(eligible, test.itermax_select(), rng, |i| {
            let model = match test.bank().item(i)?.model(key) {
                Some(model) => model,
                None => return Ok(f64::INFINITY),
            };
            let mut info = base.clone();
            model.fisher_information(theta, cov, &mut info)?;
            if n == 1 {
                return Ok(-info[(0, 0)]);
            }
            match self.objective {
                FisherObjective::DOptimality => Ok(-info.lu().determinant()),
                FisherObjective::AOptimality => info
                    .try_inverse()
                    .map(|inv| inv.trace())
                    .ok_or(CatError::SingularMatrix("A-optimality inverse")),
            }
        })?;
        pick.ok_or(CatError::IndexOutOfRange { index: 0, len: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::administrand::{Administrand, Item};
    use crate::itembank::ItemBank;
    use crate::model::ResponseModel;
    use crate::models::LogisticModel;
    use crate::space::{Dim, LatentSpace, Point};
    use rand::SeedableRng;
    use std::sync::Arc;

    fn bank_with_difficulties(
        space: &Arc<LatentSpace>,
        bs: &[f64],
    ) -> (Arc<ItemBank>, Vec<Arc<dyn Administrand>>) {
        let mut bank = ItemBank::new("b");
        let mut items = Vec::new();
        for &b in bs {
            let mut m = LogisticModel::two_param(space, &[Dim::cont(0)]).unwrap();
            m.set_param(0, b).unwrap();
            let item: Arc<dyn Administrand> =
                Arc::new(Item::with_model(format!("b={}", b), Arc::new(m)));
            bank.add_item(Arc::clone(&item));
            items.push(item);
        }
        (Arc::new(bank), items)
    }

    #[test]
    fn unidimensional_pick_is_most_informative() {
        let space = LatentSpace::unidimensional();
        let (bank, _) = bank_with_difficulties(&space, &[-2.0, -0.2, 1.0, 2.5]);
        let test = Test::new("t", bank);

        let mut examinee = Examinee::new("e");
        examinee.set_est_theta(Point::new(&space));
        let mut rng = Pcg64::seed_from_u64(2);
        let pick = MaxFisher::new(1)
            .select(&test, &examinee, &BitMask::ones(4), &mut rng)
            .unwrap();
        // 2PL information peaks at theta = b; b = -0.2 is nearest 0.
        assert_eq!(pick, 1);
    }

    #[test]
    fn administered_information_shifts_the_choice() {
        let space = LatentSpace::unidimensional();
        let (bank, items) = bank_with_difficulties(&space, &[0.0, 0.1]);
        let test = Test::new("t", bank);

        let mut examinee = Examinee::new("e");
        examinee.set_est_theta(Point::new(&space));
        examinee.record(Arc::clone(&items[0]), 1).unwrap();
        let eligible = {
            let mut m = BitMask::ones(2);
            m.clear(0);
            m
        };
        let mut rng = Pcg64::seed_from_u64(2);
        let pick = MaxFisher::new(1)
            .select(&test, &examinee, &eligible, &mut rng)
            .unwrap();
        assert_eq!(pick, 1);
    }
}
