//! Test configuration and the per-examinee administration loop.

use std::sync::Arc;

use rand_pcg::Pcg64;
use tracing::{debug, warn};

use crate::administrand::default_model_key;
use crate::algorithm::{Administer, Administered, Filter, Finalize, Initialize, Select, StopCrit};
use crate::bitmask::BitMask;
use crate::error::{CatError, Result};
use crate::examinee::Examinee;
use crate::intern::Quark;
use crate::itembank::ItemBank;

/// Upper bound on selection attempts inside randomized choosers.
pub const DEFAULT_ITERMAX_SELECT: usize = 50;
/// Absolute cap on items administered in one run.
pub const DEFAULT_ITERMAX_ITEMS: usize = 200;

/// One experimental condition: an item bank plus registered algorithms.
///
/// Configured once, then [`Test::administer`] runs the adaptive loop for
/// each examinee: initialize, then select / respond / observe / check-stop
/// until a stopping criterion fires or a safety cap is hit, then finalize.
pub struct Test {
    name: String,
    bank: Arc<ItemBank>,
    model_key: Quark,
    /// Expected test length, used by stratified selectors for sizing.
    length_hint: Option<usize>,
    itermax_select: usize,
    itermax_items: usize,
    initializers: Vec<Arc<dyn Initialize>>,
    filters: Vec<Arc<dyn Filter>>,
    selectors: Vec<Arc<dyn Select>>,
    administers: Vec<Arc<dyn Administer>>,
    observers: Vec<Arc<dyn Administered>>,
    stopcrits: Vec<Arc<dyn StopCrit>>,
    finalizers: Vec<Arc<dyn Finalize>>,
}

impl Test {
    pub fn new(name: impl Into<String>, bank: Arc<ItemBank>) -> Test {
        Test {
            name: name.into(),
            bank,
            model_key: default_model_key(),
            length_hint: None,
            itermax_select: DEFAULT_ITERMAX_SELECT,
            itermax_items: DEFAULT_ITERMAX_ITEMS,
            initializers: Vec::new(),
            filters: Vec::new(),
            selectors: Vec::new(),
            administers: Vec::new(),
            observers: Vec::new(),
            stopcrits: Vec::new(),
            finalizers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bank(&self) -> &Arc<ItemBank> {
        &self.bank
    }

    /// The model key algorithms on this test evaluate items under.
    pub fn model_key(&self) -> Quark {
        self.model_key
    }

    pub fn set_model_key(&mut self, key: Quark) {
        self.model_key = key;
    }

    pub fn length_hint(&self) -> Option<usize> {
        self.length_hint
    }

    pub fn set_length_hint(&mut self, length: usize) {
        self.length_hint = Some(length);
    }

    pub fn itermax_select(&self) -> usize {
        self.itermax_select
    }

    pub fn set_itermax_select(&mut self, cap: usize) {
        self.itermax_select = cap;
    }

    pub fn set_itermax_items(&mut self, cap: usize) {
        self.itermax_items = cap;
    }

    pub fn add_initialize(&mut self, alg: Arc<dyn Initialize>) {
        self.initializers.push(alg);
    }

    pub fn add_filter(&mut self, alg: Arc<dyn Filter>) {
        self.filters.push(alg);
    }

    pub fn add_select(&mut self, alg: Arc<dyn Select>) {
        self.selectors.push(alg);
    }

    /// Registers the response source. A later registration replaces an
    /// earlier one at run time: administers record into the history, and
    /// running several would append twice per position.
    pub fn add_administer(&mut self, alg: Arc<dyn Administer>) {
        self.administers.push(alg);
    }

    pub fn add_administered(&mut self, alg: Arc<dyn Administered>) {
        self.observers.push(alg);
    }

    pub fn add_stopcrit(&mut self, alg: Arc<dyn StopCrit>) {
        self.stopcrits.push(alg);
    }

    pub fn add_finalize(&mut self, alg: Arc<dyn Finalize>) {
        self.finalizers.push(alg);
    }

    fn require(&self, present: bool, phase: &'static str) -> Result<()> {
        if present {
            Ok(())
        } else {
            Err(CatError::IncompleteConfiguration {
                test: self.name.clone(),
                phase,
            })
        }
    }

    /// Runs one full adaptive administration for `examinee`.
    ///
    /// History is cleared at the start; trait tracks and covariates
    /// persist across runs. Returns after a stopping criterion fires,
    /// no item is eligible, or `itermax_items` is reached.
    pub fn administer(&self, examinee: &mut Examinee, rng: &mut Pcg64) -> Result<()> {
        self.require(!self.selectors.is_empty(), "select")?;
        self.require(!self.administers.is_empty(), "administer")?;
        self.require(!self.stopcrits.is_empty(), "stopcrit")?;

        examinee.reset_history();
        for alg in &self.initializers {
            alg.initialize(self, examinee, rng)?;
        }

        let mut capped = true;
        for _ in 0..self.itermax_items {
            let mut eligible = BitMask::ones(self.bank.len());
            for (i, item) in self.bank.iter().enumerate() {
                if examinee.was_administered(item) {
                    eligible.clear(i);
                }
            }
            for alg in &self.filters {
                alg.filter(self, examinee, &mut eligible)?;
            }
            if eligible.count() == 0 {
                warn!(
                    test = %self.name,
                    examinee = %examinee.name(),
                    administered = examinee.num_administered(),
                    "no item eligible for selection, ending test early"
                );
                capped = false;
                break;
            }

            let mut choice = None;
            for alg in &self.selectors {
                choice = Some(alg.select(self, examinee, &eligible, rng)?);
            }
            let index = choice.ok_or(CatError::IncompleteConfiguration {
                test: self.name.clone(),
                phase: "select",
            })?;
            let item = Arc::clone(self.bank.item(index)?);
            if examinee.was_administered(&item) {
                return Err(CatError::AlreadyAdministered {
                    index,
                    examinee: examinee.name().to_owned(),
                });
            }

            // Administers append to the history, so only the most recent
            // registration runs.
            let administer =
                self.administers
                    .last()
                    .ok_or(CatError::IncompleteConfiguration {
                        test: self.name.clone(),
                        phase: "administer",
                    })?;
            let resp = administer.administer(self, examinee, &item, rng)?;
            debug!(
                test = %self.name,
                examinee = %examinee.name(),
                item = %item.name(),
                resp,
                "administered item"
            );
            for alg in &self.observers {
                alg.administered(self, examinee, &item, resp, rng)?;
            }

            let mut stop = false;
            for alg in &self.stopcrits {
                if alg.stop(self, examinee)? {
                    stop = true;
                }
            }
            if stop {
                capped = false;
                break;
            }
        }
        if capped {
            warn!(
                test = %self.name,
                examinee = %examinee.name(),
                cap = self.itermax_items,
                "item cap reached before any stopping criterion fired"
            );
        }

        for alg in &self.finalizers {
            alg.finalize(self, examinee, rng)?;
        }
        Ok(())
    }
}
