//! Sparse named covariates attached to examinees.

use std::collections::HashMap;

use crate::error::{CatError, Result};
use crate::intern::{quark, try_quark, Quark};

/// Interned-name to value map. Unset covariates read as 0.0, so models can
/// reference covariates an examinee does not carry.
#[derive(Clone, Default)]
pub struct Covariates {
    values: HashMap<Quark, f64>,
}

impl Covariates {
    pub fn new() -> Covariates {
        Covariates::default()
    }

    pub fn set(&mut self, key: Quark, value: f64) {
        self.values.insert(key, value);
    }

    pub fn set_by_name(&mut self, name: &str, value: f64) {
        self.set(quark(name), value);
    }

    /// Value of covariate `key`, or 0.0 if unset.
    pub fn get(&self, key: Quark) -> f64 {
        self.values.get(&key).copied().unwrap_or(0.0)
    }

    /// Strict lookup by name; fails if the name was never interned or the
    /// covariate is not present.
    pub fn lookup(&self, name: &str) -> Result<f64> {
        let key =
            try_quark(name).ok_or_else(|| CatError::UnknownCovariate(name.to_owned()))?;
        self.values
            .get(&key)
            .copied()
            .ok_or_else(|| CatError::UnknownCovariate(name.to_owned()))
    }

    pub fn contains(&self, key: Quark) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Quark, f64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }
}
