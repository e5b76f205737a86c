//! Fixed test length stopping criterion.

use crate::algorithm::StopCrit;
use crate::error::Result;
use crate::examinee::Examinee;
use crate::test::Test;

/// Stops after `length` items.
pub struct FixedLength {
    length: usize,
}

impl FixedLength {
    pub fn new(length: usize) -> FixedLength {
        FixedLength {
            length: length.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl StopCrit for FixedLength {
    fn stop(&self, _test: &Test, examinee: &Examinee) -> Result<bool> {
        Ok(examinee.num_administered() >= self.length)
    }
}
