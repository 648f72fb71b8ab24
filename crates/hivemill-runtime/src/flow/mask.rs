//! Dynamically sized bit set.

use std::fmt;

use fixedbitset::FixedBitSet;

/// Bit set sized at resolution time.
///
/// Used for dependency masks and produced flags (one bit per data key) and
/// for completion flags (one bit per algorithm). Setting a bit past the
/// current length grows the mask.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct DataMask {
    bits: FixedBitSet,
}

impl DataMask {
    /// Creates an all-zero mask able to hold `len` bits.
    pub fn with_len(len: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(len),
        }
    }

    /// Creates a mask of length `len` with the given bits set.
    pub fn from_bits(len: usize, bits: impl IntoIterator<Item = usize>) -> Self {
        let mut mask = Self::with_len(len);
        for bit in bits {
            mask.insert(bit);
        }
        mask
    }

    /// Number of addressable bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` if the mask has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.len() == 0
    }

    /// Sets a bit.
    pub fn insert(&mut self, bit: usize) {
        if bit >= self.bits.len() {
            self.bits.grow(bit + 1);
        }
        self.bits.insert(bit);
    }

    /// Clears a bit.
    pub fn remove(&mut self, bit: usize) {
        if bit < self.bits.len() {
            self.bits.set(bit, false);
        }
    }

    /// Returns whether a bit is set.
    #[inline]
    pub fn contains(&self, bit: usize) -> bool {
        self.bits.contains(bit)
    }

    /// Clears every bit, keeping the length.
    pub fn clear(&mut self) {
        self.bits.clear();
    }

    /// Returns `true` if no bit is set.
    pub fn none(&self) -> bool {
        self.count_ones() == 0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones(..)
    }

    /// Sets every bit that is set in `other`.
    pub fn union_with(&mut self, other: &DataMask) {
        self.bits.union_with(&other.bits);
    }

    /// Clears every bit that is set in `other`.
    pub fn difference_with(&mut self, other: &DataMask) {
        self.bits.difference_with(&other.bits);
    }

    /// Returns `true` if every bit set in `self` is also set in `other`.
    pub fn is_subset(&self, other: &DataMask) -> bool {
        self.bits.is_subset(&other.bits)
    }

    /// Returns `true` if `self` and `other` share no set bit.
    pub fn is_disjoint(&self, other: &DataMask) -> bool {
        self.bits.is_disjoint(&other.bits)
    }

    /// Iterates over the indices of set bits in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }
}

impl fmt::Debug for DataMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ones()).finish()
    }
}
