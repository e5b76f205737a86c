//! Recovery benchmarks over simulated populations.

use std::sync::Arc;

use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_pcg::Pcg64;

use catsim::administrand::Item;
use catsim::algorithms::{EstimateMle, FixedLength, PickRand, Simulate};
use catsim::models::LogisticModel;
use catsim::{Dim, ItemBank, LatentSpace, ResponseModel, Test};

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn one_param_bank(space: &Arc<LatentSpace>, n: usize, seed: u64) -> Arc<ItemBank> {
    init_logging();
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut bank = ItemBank::with_capacity("bank", n);
    for i in 0..n {
        let mut m = LogisticModel::one_param(space, &[Dim::cont(0)]).unwrap();
        let b: f64 = StandardNormal.sample(&mut rng);
        m.set_param(0, b).unwrap();
        bank.add_item(Arc::new(Item::with_model(format!("q{}", i), Arc::new(m))));
    }
    Arc::new(bank)
}

fn mse_at_length(bank: &Arc<ItemBank>, space: &Arc<LatentSpace>, length: usize) -> f64 {
    let mut test = Test::new("recovery", Arc::clone(bank));
    test.set_length_hint(length);
    let estimator = Arc::new(EstimateMle::new(space));
    test.add_initialize(estimator.clone());
    test.add_administered(estimator);
    test.add_select(Arc::new(PickRand::new()));
    test.add_administer(Arc::new(Simulate::new()));
    test.add_stopcrit(Arc::new(FixedLength::new(length)));

    let mut examinees = catsim::batch::spawn_examinees(1000, space, 42).unwrap();
    catsim::batch::administer_batch(&test, &mut examinees, 4242).unwrap();

    examinees
        .iter()
        .map(|e| {
            let truth = e.sim_theta().unwrap().get_cont(Dim::cont(0)).unwrap();
            let est = e.est_theta().unwrap().get_cont(Dim::cont(0)).unwrap();
            // Estimates from all-correct or all-incorrect response strings
            // have no finite maximum; cap their contribution so a handful
            // of extremes does not drown the trend.
            let err = (est - truth).clamp(-6.0, 6.0);
            err * err
        })
        .sum::<f64>()
        / 1000.0
}

#[test]
fn squared_error_shrinks_with_test_length() {
    let space = LatentSpace::unidimensional();
    let bank = one_param_bank(&space, 400, 9);
    let mse10 = mse_at_length(&bank, &space, 10);
    let mse20 = mse_at_length(&bank, &space, 20);
    let mse30 = mse_at_length(&bank, &space, 30);
    assert!(
        mse10 > mse20 && mse20 > mse30,
        "MSE not decreasing: {} {} {}",
        mse10,
        mse20,
        mse30
    );
    assert!(mse30 < 0.5, "30-item MSE {} too large", mse30);
}
