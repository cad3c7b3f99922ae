use fixedbitset::FixedBitSet;

/// A set over the fixed range `0..len`. Used for dominance frontiers and the
/// per-variable worklists of ɸ-placement.
///
/// Querying an index outside of `0..len` is a programming error and panics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitSet {
    bits: FixedBitSet,
}

impl BitSet {
    pub fn new(len: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(len),
        }
    }

    /// The size of the range this set was created for.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.check(index);
        self.bits.contains(index)
    }

    /// Add an index to the set. Returns `true` if it was not present before.
    pub fn insert(&mut self, index: usize) -> bool {
        self.check(index);
        !self.bits.put(index)
    }

    /// Remove an index from the set. Returns `true` if it was present.
    pub fn remove(&mut self, index: usize) -> bool {
        self.check(index);
        let present = self.bits.contains(index);
        self.bits.set(index, false);
        present
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_clear()
    }

    /// Remove and return the smallest index in the set.
    pub fn pop_first(&mut self) -> Option<usize> {
        let first = self.bits.ones().next()?;
        self.bits.set(first, false);
        Some(first)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.bits.len(),
            "bitset index {} is outside of the declared range 0..{}",
            index,
            self.bits.len()
        );
    }
}
