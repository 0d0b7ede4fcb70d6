use std::fmt;
use std::ops::{BitAnd, BitOr, Sub};

/// Bitmask over field ordinals telling which fields a value carries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldSet(u64);

impl FieldSet {
    /// Highest number of fields a schema may declare.
    pub const CAPACITY: usize = 64;

    pub const fn empty() -> Self {
        FieldSet(0)
    }

    /// All ordinals below `count`.
    pub const fn first(count: usize) -> Self {
        if count >= Self::CAPACITY {
            FieldSet(u64::MAX)
        } else {
            FieldSet((1u64 << count) - 1)
        }
    }

    pub const fn from_bits(bits: u64) -> Self {
        FieldSet(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn of(ordinals: impl IntoIterator<Item = u8>) -> Self {
        ordinals.into_iter().fold(FieldSet::empty(), FieldSet::with)
    }

    pub const fn contains(self, ordinal: u8) -> bool {
        ordinal < 64 && self.0 & (1u64 << ordinal) != 0
    }

    pub const fn contains_all(self, other: FieldSet) -> bool {
        other.0 & !self.0 == 0
    }

    /// Add `ordinal`; ordinals past the capacity are ignored, as in `contains`.
    #[must_use]
    pub const fn with(self, ordinal: u8) -> Self {
        if ordinal >= 64 {
            return self;
        }
        FieldSet(self.0 | (1u64 << ordinal))
    }

    #[must_use]
    pub const fn without(self, ordinal: u8) -> Self {
        if ordinal >= 64 {
            return self;
        }
        FieldSet(self.0 & !(1u64 << ordinal))
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Rank of `ordinal` among the present fields.
    pub fn index_of(self, ordinal: u8) -> Option<usize> {
        if !self.contains(ordinal) {
            return None;
        }
        let below = self.0 & ((1u64 << ordinal) - 1);
        Some(below.count_ones() as usize)
    }

    /// The only ordinal of a one-field set.
    pub fn single(self) -> Option<u8> {
        if self.len() == 1 {
            Some(self.0.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Present ordinals, ascending.
    pub fn iter(self) -> Iter {
        Iter(self.0)
    }
}

impl BitOr for FieldSet {
    type Output = FieldSet;

    fn bitor(self, rhs: FieldSet) -> FieldSet {
        FieldSet(self.0 | rhs.0)
    }
}

impl BitAnd for FieldSet {
    type Output = FieldSet;

    fn bitand(self, rhs: FieldSet) -> FieldSet {
        FieldSet(self.0 & rhs.0)
    }
}

impl Sub for FieldSet {
    type Output = FieldSet;

    fn sub(self, rhs: FieldSet) -> FieldSet {
        FieldSet(self.0 & !rhs.0)
    }
}

impl IntoIterator for FieldSet {
    type Item = u8;
    type IntoIter = Iter;

    fn into_iter(self) -> Iter {
        self.iter()
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Ascending iterator over the ordinals of a [`FieldSet`].
#[derive(Debug, Clone)]
pub struct Iter(u64);

impl Iterator for Iter {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.0 == 0 {
            return None;
        }
        let ordinal = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Some(ordinal)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Iter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_and_capacity() {
        assert_eq!(FieldSet::first(0), FieldSet::empty());
        assert_eq!(FieldSet::first(3).bits(), 0b111);
        assert_eq!(FieldSet::first(64).len(), 64);
        assert!(FieldSet::first(64).contains(63));
    }

    #[test]
    fn test_membership_and_rank() {
        let set = FieldSet::of([1, 4, 6]);
        assert!(set.contains(4));
        assert!(!set.contains(0));
        assert!(!set.contains(200));
        assert_eq!(set.index_of(1), Some(0));
        assert_eq!(set.index_of(6), Some(2));
        assert_eq!(set.index_of(5), None);
        assert_eq!(set.single(), None);
        assert_eq!(FieldSet::of([9]).single(), Some(9));
    }

    #[test]
    fn test_iteration_is_ascending() {
        let set = FieldSet::of([63, 0, 17]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 17, 63]);
        assert_eq!(set.iter().len(), 3);
    }

    #[test]
    fn test_set_algebra() {
        let a = FieldSet::of([0, 1, 2]);
        let b = FieldSet::of([2, 3]);

        let union = a | b;
        assert_eq!(union.len(), 4);
        assert!(union.len() >= a.len().max(b.len()));
        assert_eq!((a & b).iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!((a - b).iter().collect::<Vec<_>>(), vec![0, 1]);
        assert!(union.contains_all(a));
        assert!(!a.contains_all(b));
        assert_eq!(a.without(1).with(5), FieldSet::of([0, 2, 5]));
    }

    #[test]
    fn test_out_of_range_ordinals_are_ignored() {
        let set = FieldSet::of([3]);
        assert_eq!(set.with(64), set);
        assert_eq!(set.with(u8::MAX), set);
        assert_eq!(set.without(200), set);
        assert_eq!(FieldSet::of([1, 64, 255]), FieldSet::of([1]));
    }

    #[test]
    fn test_union_never_shrinks() {
        let sets = [FieldSet::empty(), FieldSet::of([0]), FieldSet::of([1, 2]), FieldSet::first(8), FieldSet::of([2, 63])];
        for a in sets {
            for b in sets {
                assert!((a | b).len() >= a.len().max(b.len()));
            }
        }
    }
}
