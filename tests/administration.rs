//! End-to-end adaptive administration runs.

use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Pcg64;

use catsim::administrand::{Administrand, Item};
use catsim::algorithm::{Administer, Select};
use catsim::algorithms::{
    AStratify, ClassRates, EstimateMle, ExposureCounter, FixedLength, MaxFisher, MaxKl, PickRand,
    Simulate, StopOnSe,
};
use catsim::bitmask::BitMask;
use catsim::models::{Dina, LogisticModel};
use catsim::{CatError, Dim, Examinee, ItemBank, LatentSpace, ResponseModel, Test};

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn two_param_bank(space: &Arc<LatentSpace>, n: usize, seed: u64) -> Arc<ItemBank> {
    use rand_distr::{Distribution, StandardNormal};
    init_logging();
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut bank = ItemBank::with_capacity("bank", n);
    for i in 0..n {
        let mut m = LogisticModel::two_param(space, &[Dim::cont(0)]).unwrap();
        let b: f64 = StandardNormal.sample(&mut rng);
        m.set_param(0, b).unwrap();
        let a: f64 = StandardNormal.sample(&mut rng);
        m.set_slope(0, 0.8 + 0.4 * a.abs()).unwrap();
        bank.add_item(Arc::new(Item::with_model(format!("q{}", i), Arc::new(m))));
    }
    Arc::new(bank)
}

fn standard_test(bank: Arc<ItemBank>, space: &Arc<LatentSpace>, length: usize) -> Test {
    let mut test = Test::new("adaptive", bank);
    test.set_length_hint(length);
    let estimator = Arc::new(EstimateMle::new(space));
    test.add_initialize(estimator.clone());
    test.add_administered(estimator);
    test.add_administer(Arc::new(Simulate::new()));
    test.add_stopcrit(Arc::new(FixedLength::new(length)));
    test
}

#[test]
fn fisher_driven_run_reaches_fixed_length_without_repeats() {
    let space = LatentSpace::unidimensional();
    let bank = two_param_bank(&space, 60, 1);
    let mut test = standard_test(Arc::clone(&bank), &space, 20);
    test.add_select(Arc::new(MaxFisher::new(1)));

    let mut examinees = catsim::batch::spawn_examinees(10, &space, 5).unwrap();
    for (i, examinee) in examinees.iter_mut().enumerate() {
        let mut rng = Pcg64::seed_from_u64(100 + i as u64);
        test.administer(examinee, &mut rng).unwrap();
        assert_eq!(examinee.num_administered(), 20);

        // No item is selected twice.
        for (j, (item, _)) in examinee.history().iter().enumerate() {
            for (other, _) in &examinee.history()[j + 1..] {
                assert!(!Arc::ptr_eq(item, other));
            }
        }
        let est = examinee.est_theta().unwrap().get_cont(Dim::cont(0)).unwrap();
        assert!(est.is_finite());
    }
}

#[test]
fn standard_error_stopping_ends_before_the_cap() {
    let space = LatentSpace::unidimensional();
    let bank = two_param_bank(&space, 80, 2);
    let mut test = standard_test(Arc::clone(&bank), &space, 60);
    test.add_select(Arc::new(MaxFisher::new(1)));
    test.add_stopcrit(Arc::new(StopOnSe::new(0.5, 5)));

    let mut examinees = catsim::batch::spawn_examinees(5, &space, 11).unwrap();
    for (i, examinee) in examinees.iter_mut().enumerate() {
        let mut rng = Pcg64::seed_from_u64(200 + i as u64);
        test.administer(examinee, &mut rng).unwrap();
        assert!(examinee.num_administered() >= 5);
        assert!(examinee.num_administered() < 60);
    }
}

#[test]
fn exposure_rates_sum_to_test_length() {
    let space = LatentSpace::unidimensional();
    let bank = two_param_bank(&space, 50, 3);
    let length = 12;
    let mut test = standard_test(Arc::clone(&bank), &space, length);
    test.add_select(Arc::new(PickRand::new()));
    let counter = Arc::new(ExposureCounter::new(bank.len()));
    test.add_administered(counter.clone());
    test.add_finalize(counter.clone());

    let mut examinees = catsim::batch::spawn_examinees(40, &space, 21).unwrap();
    catsim::batch::administer_batch(&test, &mut examinees, 500).unwrap();

    assert_eq!(counter.num_examinees(), 40);
    let total: f64 = counter.rates().iter().sum();
    assert!((total - length as f64).abs() < 1e-9);
}

#[test]
fn stratified_selection_follows_the_schedule() {
    let space = LatentSpace::unidimensional();
    let bank = two_param_bank(&space, 40, 4);
    let mut test = standard_test(Arc::clone(&bank), &space, 4);
    let strat = Arc::new(AStratify::new(4).with_schedule(vec![1, 1, 1, 1]));
    strat.restratify(&test).unwrap();
    let strata = strat.strata();
    test.add_filter(strat.clone());
    test.add_select(Arc::new(PickRand::new()));

    let mut examinee = catsim::batch::spawn_examinees(1, &space, 31).unwrap().pop().unwrap();
    let mut rng = Pcg64::seed_from_u64(77);
    test.administer(&mut examinee, &mut rng).unwrap();
    assert_eq!(examinee.num_administered(), 4);
    for (pos, (item, _)) in examinee.history().iter().enumerate() {
        let index = bank.iter().position(|i| Arc::ptr_eq(i, item)).unwrap();
        assert!(strata[pos].test(index), "position {} drew outside its stratum", pos);
    }
}

#[test]
fn missing_phases_are_configuration_errors() {
    let space = LatentSpace::unidimensional();
    let bank = two_param_bank(&space, 5, 5);
    let mut test = Test::new("incomplete", bank);
    test.add_select(Arc::new(PickRand::new()));
    test.add_administer(Arc::new(Simulate::new()));

    let mut examinee = catsim::batch::spawn_examinees(1, &space, 1).unwrap().pop().unwrap();
    let mut rng = Pcg64::seed_from_u64(0);
    let err = test.administer(&mut examinee, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        CatError::IncompleteConfiguration { phase: "stopcrit", .. }
    ));
}

#[test]
fn repeat_selection_is_rejected() {
    struct AlwaysFirst;
    impl Select for AlwaysFirst {
        fn select(
            &self,
            _test: &Test,
            _examinee: &Examinee,
            _eligible: &BitMask,
            _rng: &mut Pcg64,
        ) -> catsim::Result<usize> {
            Ok(0)
        }
    }

    let space = LatentSpace::unidimensional();
    let bank = two_param_bank(&space, 5, 6);
    let mut test = standard_test(bank, &space, 3);
    test.add_select(Arc::new(AlwaysFirst));

    let mut examinee = catsim::batch::spawn_examinees(1, &space, 2).unwrap().pop().unwrap();
    let mut rng = Pcg64::seed_from_u64(0);
    let err = test.administer(&mut examinee, &mut rng).unwrap_err();
    assert!(matches!(err, CatError::AlreadyAdministered { index: 0, .. }));
}

#[test]
fn exhausted_bank_ends_the_run_cleanly() {
    let space = LatentSpace::unidimensional();
    let bank = two_param_bank(&space, 3, 7);
    let mut test = standard_test(bank, &space, 10);
    test.add_select(Arc::new(PickRand::new()));

    let mut examinee = catsim::batch::spawn_examinees(1, &space, 3).unwrap().pop().unwrap();
    let mut rng = Pcg64::seed_from_u64(0);
    test.administer(&mut examinee, &mut rng).unwrap();
    assert_eq!(examinee.num_administered(), 3);
}

#[test]
fn cognitive_diagnosis_run_classifies_most_examinees() {
    init_logging();
    let space = LatentSpace::attributes(2);
    let mut bank = ItemBank::new("cdm");
    let dim_sets: [&[Dim]; 3] = [
        &[Dim::bin(0)],
        &[Dim::bin(1)],
        &[Dim::bin(0), Dim::bin(1)],
    ];
    for round in 0..4 {
        for (k, dims) in dim_sets.iter().enumerate() {
            let mut m = Dina::new(&space, dims).unwrap();
            m.set_guess(0.1).unwrap();
            m.set_slip(0.1).unwrap();
            bank.add_item(Arc::new(Item::with_model(
                format!("d{}-{}", round, k),
                Arc::new(m),
            )));
        }
    }
    let bank = Arc::new(bank);

    let mut test = Test::new("cdm", bank);
    test.set_length_hint(8);
    let estimator = Arc::new(EstimateMle::new(&space));
    test.add_initialize(estimator.clone());
    test.add_administered(estimator);
    test.add_select(Arc::new(MaxKl::new(1)));
    test.add_administer(Arc::new(Simulate::new()));
    test.add_stopcrit(Arc::new(FixedLength::new(8)));
    let rates = Arc::new(ClassRates::new());
    test.add_finalize(rates.clone());

    let mut examinees = catsim::batch::spawn_examinees(60, &space, 13).unwrap();
    catsim::batch::administer_batch(&test, &mut examinees, 900).unwrap();

    assert_eq!(rates.num_examinees(), 60);
    assert!(rates.pattern_rate() > 0.6, "pattern rate {}", rates.pattern_rate());
    assert!(rates.attr_rate(0).unwrap() > 0.7);
    assert!(rates.attr_rate(1).unwrap() > 0.7);
}

#[test]
fn only_the_last_registered_administer_records() {
    struct AlwaysIncorrect;
    impl Administer for AlwaysIncorrect {
        fn administer(
            &self,
            _test: &Test,
            examinee: &mut Examinee,
            item: &Arc<dyn Administrand>,
            _rng: &mut Pcg64,
        ) -> catsim::Result<u8> {
            examinee.record(Arc::clone(item), 0)?;
            Ok(0)
        }
    }

    let space = LatentSpace::unidimensional();
    let bank = two_param_bank(&space, 10, 8);
    let length = 4;
    let mut test = standard_test(Arc::clone(&bank), &space, length);
    test.add_select(Arc::new(PickRand::new()));
    test.add_administer(Arc::new(AlwaysIncorrect));

    let mut examinee = catsim::batch::spawn_examinees(1, &space, 4).unwrap().pop().unwrap();
    let mut rng = Pcg64::seed_from_u64(55);
    test.administer(&mut examinee, &mut rng).unwrap();

    // One history entry per position, all from the later registration.
    assert_eq!(examinee.num_administered(), length);
    for (_, resp) in examinee.history() {
        assert_eq!(*resp, 0);
    }
}
