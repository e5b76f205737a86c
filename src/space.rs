//! Latent trait spaces and the points that live in them.
//!
//! A [`LatentSpace`] declares the dimensions (continuous, binary, or
//! natural-valued) over which ability vectors and item parameters are
//! defined. Dimension identifiers pack a 2-bit type tag with a 14-bit
//! index, so a space carries at most 16,383 dimensions of each type.
//! Spaces are immutable after construction and shared by reference among
//! points, models, and examinees.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::DVector;

use crate::bitmask::BitMask;
use crate::error::{CatError, Result};

/// Maximum number of dimensions of any one type.
pub const DIM_MAX: u16 = 0x3fff;

const TYPE_SHIFT: u16 = 14;
const INDEX_MASK: u16 = 0x3fff;

/// The value type of a latent dimension.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DimType {
    /// Real-valued trait (IRT theta).
    Continuous,
    /// 0/1 mastery attribute (cognitive diagnosis).
    Binary,
    /// Bounded category code 0..=max.
    Natural,
}

/// Packed dimension identifier: 2-bit type tag, 14-bit within-type index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Dim(u16);

impl Dim {
    pub fn cont(index: u16) -> Dim {
        debug_assert!(index <= DIM_MAX);
        Dim((1 << TYPE_SHIFT) | index)
    }

    pub fn bin(index: u16) -> Dim {
        debug_assert!(index <= DIM_MAX);
        Dim((2 << TYPE_SHIFT) | index)
    }

    pub fn nat(index: u16) -> Dim {
        debug_assert!(index <= DIM_MAX);
        Dim((3 << TYPE_SHIFT) | index)
    }

    pub fn dim_type(self) -> DimType {
        match self.0 >> TYPE_SHIFT {
            1 => DimType::Continuous,
            2 => DimType::Binary,
            _ => DimType::Natural,
        }
    }

    /// Index within the dimension's type.
    pub fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }
}

/// An ordered set of typed latent dimensions.
pub struct LatentSpace {
    num_cont: u16,
    num_bin: u16,
    /// Per-dimension maximum category for natural dimensions.
    nat_max: Vec<u16>,
    names: HashMap<String, Dim>,
}

impl LatentSpace {
    /// A space with the given dimension counts and default dimension names
    /// (`Cont.1`, `Bin.1`, `Nat.1`, ...).
    pub fn new(num_cont: u16, num_bin: u16, nat_max: &[u16]) -> Arc<LatentSpace> {
        assert!(num_cont <= DIM_MAX && num_bin <= DIM_MAX && nat_max.len() <= DIM_MAX as usize);
        let mut names = HashMap::new();
        for i in 0..num_cont {
            names.insert(format!("Cont.{}", i + 1), Dim::cont(i));
        }
        for i in 0..num_bin {
            names.insert(format!("Bin.{}", i + 1), Dim::bin(i));
        }
        for i in 0..nat_max.len() as u16 {
            names.insert(format!("Nat.{}", i + 1), Dim::nat(i));
        }
        Arc::new(LatentSpace {
            num_cont,
            num_bin,
            nat_max: nat_max.to_vec(),
            names,
        })
    }

    /// Unidimensional continuous space, the common IRT case.
    pub fn unidimensional() -> Arc<LatentSpace> {
        LatentSpace::new(1, 0, &[])
    }

    /// A space of `num_bin` mastery attributes for cognitive diagnosis.
    pub fn attributes(num_bin: u16) -> Arc<LatentSpace> {
        LatentSpace::new(0, num_bin, &[])
    }

    pub fn num_cont(&self) -> usize {
        self.num_cont as usize
    }

    pub fn num_bin(&self) -> usize {
        self.num_bin as usize
    }

    pub fn num_nat(&self) -> usize {
        self.nat_max.len()
    }

    /// Maximum category code of natural dimension `index`.
    pub fn nat_max(&self, index: usize) -> u16 {
        self.nat_max[index]
    }

    /// Resolves a dimension by name. Names are unique within a space.
    pub fn dim_by_name(&self, name: &str) -> Option<Dim> {
        self.names.get(name).copied()
    }

    /// Human-readable name of a dimension in this space.
    pub fn dim_name(&self, dim: Dim) -> String {
        self.names
            .iter()
            .find(|(_, &d)| d == dim)
            .map(|(n, _)| n.clone())
            .unwrap_or_else(|| format!("{:?}", dim))
    }

    /// Whether `dim` exists in this space.
    pub fn contains_dim(&self, dim: Dim) -> bool {
        let i = dim.index();
        match dim.dim_type() {
            DimType::Continuous => i < self.num_cont as usize,
            DimType::Binary => i < self.num_bin as usize,
            DimType::Natural => i < self.nat_max.len(),
        }
    }

    /// Exact geometric identity: same dimension counts and natural ranges.
    pub fn same_geometry(&self, other: &LatentSpace) -> bool {
        self.num_cont == other.num_cont
            && self.num_bin == other.num_bin
            && self.nat_max == other.nat_max
    }

    /// Directed compatibility: every dimension `other` uses is present in
    /// `self` with the same type and allowed range.
    pub fn compatible_with(&self, other: &LatentSpace) -> bool {
        self.num_cont >= other.num_cont
            && self.num_bin >= other.num_bin
            && self.nat_max.len() >= other.nat_max.len()
            && other
                .nat_max
                .iter()
                .zip(self.nat_max.iter())
                .all(|(o, s)| o == s)
    }
}

/// A coordinate in a latent space: an examinee's trait vector or any
/// other point used to evaluate a response model.
#[derive(Clone)]
pub struct Point {
    space: Arc<LatentSpace>,
    cont: DVector<f64>,
    bin: BitMask,
    nat: Vec<u16>,
}

impl Point {
    /// The origin of `space` (zeros, all attributes unmastered).
    pub fn new(space: &Arc<LatentSpace>) -> Point {
        Point {
            cont: DVector::zeros(space.num_cont()),
            bin: BitMask::new(space.num_bin()),
            nat: vec![0; space.num_nat()],
            space: Arc::clone(space),
        }
    }

    pub fn space(&self) -> &Arc<LatentSpace> {
        &self.space
    }

    pub fn get_cont(&self, dim: Dim) -> Result<f64> {
        self.check_dim(dim, DimType::Continuous)?;
        Ok(self.cont[dim.index()])
    }

    pub fn set_cont(&mut self, dim: Dim, value: f64) -> Result<()> {
        self.check_dim(dim, DimType::Continuous)?;
        if !value.is_finite() {
            return Err(CatError::OutOfRange {
                dim: self.space.dim_name(dim),
                value,
            });
        }
        self.cont[dim.index()] = value;
        Ok(())
    }

    pub fn get_bin(&self, dim: Dim) -> Result<bool> {
        self.check_dim(dim, DimType::Binary)?;
        Ok(self.bin.test(dim.index()))
    }

    pub fn set_bin(&mut self, dim: Dim, value: bool) -> Result<()> {
        self.check_dim(dim, DimType::Binary)?;
        self.bin.assign(dim.index(), value);
        Ok(())
    }

    pub fn get_nat(&self, dim: Dim) -> Result<u16> {
        self.check_dim(dim, DimType::Natural)?;
        Ok(self.nat[dim.index()])
    }

    pub fn set_nat(&mut self, dim: Dim, value: u16) -> Result<()> {
        self.check_dim(dim, DimType::Natural)?;
        if value > self.space.nat_max(dim.index()) {
            return Err(CatError::OutOfRange {
                dim: self.space.dim_name(dim),
                value: value as f64,
            });
        }
        self.nat[dim.index()] = value;
        Ok(())
    }

    /// Copies `other` into `self`. Both points must share the same geometry.
    pub fn copy_from(&mut self, other: &Point) -> Result<()> {
        if !self.space.same_geometry(&other.space) {
            return Err(CatError::SpaceMismatch("Point::copy_from".into()));
        }
        self.cont.copy_from(&other.cont);
        self.bin = other.bin.clone();
        self.nat.clone_from(&other.nat);
        Ok(())
    }

    /// The continuous coordinates as a vector, for estimation math.
    pub fn cont_vector(&self) -> &DVector<f64> {
        &self.cont
    }

    pub(crate) fn cont_mut(&mut self) -> &mut DVector<f64> {
        &mut self.cont
    }

    /// The binary coordinates as a mask, for attribute-pattern bookkeeping.
    pub fn bin_pattern(&self) -> &BitMask {
        &self.bin
    }

    pub(crate) fn bin_mut(&mut self) -> &mut BitMask {
        &mut self.bin
    }

    pub(crate) fn nat_mut(&mut self) -> &mut Vec<u16> {
        &mut self.nat
    }

    fn check_dim(&self, dim: Dim, expect: DimType) -> Result<()> {
        if dim.dim_type() != expect || !self.space.contains_dim(dim) {
            return Err(CatError::SpaceMismatch(format!(
                "dimension {:?} not a {:?} dimension of this space",
                dim, expect
            )));
        }
        Ok(())
    }
}
