//! Units of test content.
//!
//! An [`Administrand`] is anything a test can present: a single [`Item`]
//! or a whole [`crate::itembank::ItemBank`] (testlets are banks inside
//! banks). Each carries a characteristic bitmask over the process-wide
//! registry in [`crate::intern`] and zero or more named response models,
//! one of which is the default.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bitmask::BitMask;
use crate::intern::{num_characteristics, quark, CharId, Quark};
use crate::model::ResponseModel;

/// The model key used when none is given.
pub fn default_model_key() -> Quark {
    quark("default")
}

/// Characteristic bitmask over the registered characteristic table.
///
/// The mask grows lazily, so administrands created before a characteristic
/// was registered still accept it.
#[derive(Clone, Default)]
pub struct Characteristics {
    mask: BitMask,
}

impl Characteristics {
    pub fn new() -> Characteristics {
        Characteristics {
            mask: BitMask::new(num_characteristics()),
        }
    }

    pub fn set(&mut self, id: CharId) {
        self.mask.grow(id.0 + 1);
        self.mask.set(id.0);
    }

    pub fn clear(&mut self, id: CharId) {
        if id.0 < self.mask.len() {
            self.mask.clear(id.0);
        }
    }

    pub fn has(&self, id: CharId) -> bool {
        self.mask.test(id.0)
    }

    /// Set characteristics in increasing id order.
    pub fn iter(&self) -> impl Iterator<Item = CharId> + '_ {
        self.mask.iter_ones().map(CharId)
    }

    pub fn count(&self) -> usize {
        self.mask.count()
    }
}

/// A unit of content administrable by a test.
pub trait Administrand: Send + Sync {
    fn name(&self) -> &str;

    fn characteristics(&self) -> &Characteristics;

    /// Model registered under `key`, if any.
    fn model(&self, key: Quark) -> Option<&Arc<dyn ResponseModel>>;

    /// The model registered under the default key.
    fn default_model(&self) -> Option<&Arc<dyn ResponseModel>> {
        self.model(default_model_key())
    }
}

/// A single test question with one or more calibrated response models.
pub struct Item {
    name: String,
    characteristics: Characteristics,
    models: HashMap<Quark, Arc<dyn ResponseModel>>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Item {
        Item {
            name: name.into(),
            characteristics: Characteristics::new(),
            models: HashMap::new(),
        }
    }

    /// An item with `model` installed under the default key.
    pub fn with_model(name: impl Into<String>, model: Arc<dyn ResponseModel>) -> Item {
        let mut item = Item::new(name);
        item.set_default_model(model);
        item
    }

    pub fn set_model(&mut self, key: Quark, model: Arc<dyn ResponseModel>) {
        self.models.insert(key, model);
    }

    pub fn set_default_model(&mut self, model: Arc<dyn ResponseModel>) {
        self.set_model(default_model_key(), model);
    }

    pub fn set_characteristic(&mut self, id: CharId) {
        self.characteristics.set(id);
    }

    pub fn clear_characteristic(&mut self, id: CharId) {
        self.characteristics.clear(id);
    }
}

impl Administrand for Item {
    fn name(&self) -> &str {
        &self.name
    }

    fn characteristics(&self) -> &Characteristics {
        &self.characteristics
    }

    fn model(&self, key: Quark) -> Option<&Arc<dyn ResponseModel>> {
        self.models.get(&key)
    }
}
