//! Compact bit vectors for characteristic masks, binary trait patterns,
//! and stratum membership.

/// Fixed-length bit vector backed by u64 blocks.
///
/// Ordered and hashable so attribute patterns can key classification tables.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct BitMask {
    blocks: Vec<u64>,
    len: usize,
}

impl BitMask {
    /// All-zero mask of `len` bits.
    pub fn new(len: usize) -> Self {
        BitMask {
            blocks: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// All-one mask of `len` bits.
    pub fn ones(len: usize) -> Self {
        let mut mask = BitMask::new(len);
        for bit in 0..len {
            mask.set(bit);
        }
        mask
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grows the mask to at least `len` bits, zero-filled.
    pub fn grow(&mut self, len: usize) {
        if len > self.len {
            self.blocks.resize(len.div_ceil(64), 0);
            self.len = len;
        }
    }

    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.len);
        self.blocks[bit / 64] |= 1 << (bit % 64);
    }

    pub fn clear(&mut self, bit: usize) {
        debug_assert!(bit < self.len);
        self.blocks[bit / 64] &= !(1 << (bit % 64));
    }

    pub fn assign(&mut self, bit: usize, value: bool) {
        if value {
            self.set(bit)
        } else {
            self.clear(bit)
        }
    }

    pub fn test(&self, bit: usize) -> bool {
        bit < self.len && self.blocks[bit / 64] & (1 << (bit % 64)) != 0
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Iterator over the indices of set bits, in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&bit| self.test(bit))
    }

    /// Clears every bit of `self` not also set in `other`.
    pub fn intersect(&mut self, other: &BitMask) {
        for (a, b) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            *a &= *b;
        }
        if other.blocks.len() < self.blocks.len() {
            for block in &mut self.blocks[other.blocks.len()..] {
                *block = 0;
            }
        }
    }
}
