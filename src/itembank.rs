//! Ordered collections of administrands.

use std::sync::Arc;

use crate::administrand::{Administrand, Characteristics};
use crate::error::{CatError, Result};
use crate::intern::{CharId, Quark};
use crate::model::ResponseModel;

/// An indexable bank of items (or nested banks, for testlets).
///
/// A bank is itself an [`Administrand`], so it can be placed inside
/// another bank; models attached to a bank describe the bank as a whole.
pub struct ItemBank {
    name: String,
    characteristics: Characteristics,
    items: Vec<Arc<dyn Administrand>>,
}

impl ItemBank {
    pub fn new(name: impl Into<String>) -> ItemBank {
        ItemBank {
            name: name.into(),
            characteristics: Characteristics::new(),
            items: Vec::new(),
        }
    }

    /// A bank preallocated for `size_hint` items.
    pub fn with_capacity(name: impl Into<String>, size_hint: usize) -> ItemBank {
        ItemBank {
            name: name.into(),
            characteristics: Characteristics::new(),
            items: Vec::with_capacity(size_hint),
        }
    }

    pub fn add_item(&mut self, item: Arc<dyn Administrand>) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bounds-checked item lookup.
    pub fn item(&self, index: usize) -> Result<&Arc<dyn Administrand>> {
        self.items.get(index).ok_or(CatError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Administrand>> {
        self.items.iter()
    }

    pub fn set_characteristic(&mut self, id: CharId) {
        self.characteristics.set(id);
    }
}

impl Administrand for ItemBank {
    fn name(&self) -> &str {
        &self.name
    }

    fn characteristics(&self) -> &Characteristics {
        &self.characteristics
    }

    fn model(&self, _key: Quark) -> Option<&Arc<dyn ResponseModel>> {
        None
    }
}
