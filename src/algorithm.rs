//! Phase hooks invoked during test administration.
//!
//! A test run is a pipeline of phases; an algorithm implements the
//! phase trait(s) it cares about and is registered on a [`Test`] once,
//! then reused across every examinee administered by that test. Any
//! state an algorithm accumulates (exposure counts, stratum bookkeeping)
//! is therefore shared across the whole simulation run and must be
//! internally synchronized if examinees run in parallel.

use std::sync::Arc;

use rand_pcg::Pcg64;

use crate::administrand::Administrand;
use crate::bitmask::BitMask;
use crate::error::Result;
use crate::examinee::Examinee;
use crate::test::Test;

/// Runs once per examinee before the first item.
pub trait Initialize: Send + Sync {
    fn initialize(&self, test: &Test, examinee: &mut Examinee, rng: &mut Pcg64) -> Result<()>;
}

/// Narrows the set of items eligible for the next selection.
///
/// `eligible` arrives with already-administered items cleared; filters
/// may only clear further bits, never set them.
pub trait Filter: Send + Sync {
    fn filter(&self, test: &Test, examinee: &Examinee, eligible: &mut BitMask) -> Result<()>;
}

/// Chooses the next item, as an index into the test's bank.
pub trait Select: Send + Sync {
    fn select(
        &self,
        test: &Test,
        examinee: &Examinee,
        eligible: &BitMask,
        rng: &mut Pcg64,
    ) -> Result<usize>;
}

/// Produces (or records) the response to the selected item. The
/// implementation appends to the examinee's history.
pub trait Administer: Send + Sync {
    fn administer(
        &self,
        test: &Test,
        examinee: &mut Examinee,
        item: &Arc<dyn Administrand>,
        rng: &mut Pcg64,
    ) -> Result<u8>;
}

/// Observes each completed administration. Estimators and exposure
/// counters hook in here.
pub trait Administered: Send + Sync {
    fn administered(
        &self,
        test: &Test,
        examinee: &mut Examinee,
        item: &Arc<dyn Administrand>,
        resp: u8,
        rng: &mut Pcg64,
    ) -> Result<()>;
}

/// Decides whether the test is over. Any registered criterion saying
/// stop stops the run.
pub trait StopCrit: Send + Sync {
    fn stop(&self, test: &Test, examinee: &Examinee) -> Result<bool>;
}

/// Runs once per examinee after the last item (also on early bail-out
/// when no item is eligible).
pub trait Finalize: Send + Sync {
    fn finalize(&self, test: &Test, examinee: &mut Examinee, rng: &mut Pcg64) -> Result<()>;
}
