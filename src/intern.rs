//! Process-wide string interning.
//!
//! Names for covariates, model parameters, model keys, and theta tracks are
//! interned into [`Quark`]s so that lookups reduce to integer comparison.
//! Characteristic names have their own dense registry because characteristic
//! ids double as bit positions in administrand bitmasks.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::error::{CatError, Result};

/// Interned string key. Equal strings always intern to the same quark.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Quark(u32);

/// Dense characteristic id, usable directly as a bit index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct CharId(pub usize);

struct Table {
    by_name: HashMap<String, u32>,
    names: Vec<String>,
}

impl Table {
    fn new() -> Self {
        Table {
            by_name: HashMap::new(),
            names: Vec::new(),
        }
    }

    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_owned());
        self.by_name.insert(name.to_owned(), id);
        id
    }

    fn lookup(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }
}

static QUARKS: LazyLock<RwLock<Table>> = LazyLock::new(|| RwLock::new(Table::new()));
static CHARACTERISTICS: LazyLock<RwLock<Table>> = LazyLock::new(|| RwLock::new(Table::new()));

/// Interns `name`, creating a new quark if it has not been seen before.
pub fn quark(name: &str) -> Quark {
    if let Some(id) = QUARKS.read().unwrap().lookup(name) {
        return Quark(id);
    }
    Quark(QUARKS.write().unwrap().intern(name))
}

/// Looks up an existing quark without creating one.
pub fn try_quark(name: &str) -> Option<Quark> {
    QUARKS.read().unwrap().lookup(name).map(Quark)
}

/// Returns the string a quark was interned from.
pub fn quark_name(q: Quark) -> String {
    QUARKS.read().unwrap().names[q.0 as usize].clone()
}

/// Registers a characteristic name, returning its bit index.
/// Registering the same name twice returns the same id.
pub fn register_characteristic(name: &str) -> CharId {
    if let Some(id) = CHARACTERISTICS.read().unwrap().lookup(name) {
        return CharId(id as usize);
    }
    CharId(CHARACTERISTICS.write().unwrap().intern(name) as usize)
}

/// Resolves a previously registered characteristic name.
pub fn characteristic(name: &str) -> Result<CharId> {
    CHARACTERISTICS
        .read()
        .unwrap()
        .lookup(name)
        .map(|id| CharId(id as usize))
        .ok_or_else(|| CatError::UnknownCharacteristic(name.to_owned()))
}

/// Name of a registered characteristic.
pub fn characteristic_name(id: CharId) -> Option<String> {
    CHARACTERISTICS.read().unwrap().names.get(id.0).cloned()
}

/// Number of characteristics registered so far in this process.
pub fn num_characteristics() -> usize {
    CHARACTERISTICS.read().unwrap().names.len()
}
