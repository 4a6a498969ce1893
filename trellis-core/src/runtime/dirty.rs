//! Dirty Tracking
//!
//! Every component declares its state fields up front, so a field can be
//! addressed by a small index. The dirty set is a bitmask over those indices:
//! marking, intersecting and clearing are single word operations.

use std::fmt;

/// Maximum number of fields a single component schema may declare.
pub const MAX_FIELDS: usize = 64;

/// Index of a declared state field within its component's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u8);

impl FieldId {
    pub(crate) fn new(index: usize) -> Self {
        debug_assert!(index < MAX_FIELDS);
        Self(index as u8)
    }

    /// Get the raw index value.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A set of field ids, stored as a bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldSet(u64);

impl FieldSet {
    /// The empty set.
    pub const EMPTY: FieldSet = FieldSet(0);

    /// Create an empty set.
    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Insert a field. Returns true if it was not already present.
    pub fn insert(&mut self, field: FieldId) -> bool {
        let bit = 1u64 << field.0;
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    /// Whether `field` is in the set.
    pub fn contains(&self, field: FieldId) -> bool {
        self.0 & (1u64 << field.0) != 0
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of fields in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the two sets share a field.
    pub fn intersects(&self, other: FieldSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Fields in either set.
    pub fn union(&self, other: FieldSet) -> FieldSet {
        FieldSet(self.0 | other.0)
    }

    /// True if `self` is a strict subset of `other`.
    pub fn is_strict_subset(&self, other: FieldSet) -> bool {
        self.0 & !other.0 == 0 && self.0 != other.0
    }

    /// Iterate over the contained field ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = FieldId> + '_ {
        (0..MAX_FIELDS)
            .filter(move |i| self.0 & (1u64 << i) != 0)
            .map(FieldId::new)
    }
}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        let mut set = FieldSet::EMPTY;
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.index())).finish()
    }
}

/// The set of fields changed since an instance's last completed update.
///
/// `mark` reports whether the tracker went from clean to dirty, which is the
/// moment the owning instance has to be handed to the scheduler.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    dirty: FieldSet,
}

impl DirtyTracker {
    /// Create a clean tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a field dirty. Returns true if the tracker was clean before.
    pub fn mark(&mut self, field: FieldId) -> bool {
        let was_clean = self.dirty.is_empty();
        self.dirty.insert(field);
        was_clean
    }

    /// Whether any field changed since the last update.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Fields marked since the last update.
    pub fn current(&self) -> FieldSet {
        self.dirty
    }

    /// Take the accumulated set, leaving the tracker clean.
    pub fn take(&mut self) -> FieldSet {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_set_operations() {
        let a = FieldId::new(0);
        let b = FieldId::new(5);
        let c = FieldId::new(63);

        let mut set = FieldSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(a));
        set.insert(c);

        assert!(set.contains(a));
        assert!(!set.contains(b));
        assert!(set.contains(c));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn strict_subset_excludes_equal_sets() {
        let one: FieldSet = [FieldId::new(1)].into_iter().collect();
        let both: FieldSet = [FieldId::new(1), FieldId::new(2)].into_iter().collect();

        assert!(one.is_strict_subset(both));
        assert!(!both.is_strict_subset(both));
        assert!(!both.is_strict_subset(one));
        assert!(FieldSet::EMPTY.is_strict_subset(one));
    }

    #[test]
    fn tracker_reports_first_mark_only() {
        let mut tracker = DirtyTracker::new();
        assert!(tracker.mark(FieldId::new(3)));
        assert!(!tracker.mark(FieldId::new(4)));
        assert!(!tracker.mark(FieldId::new(3)));
        assert_eq!(tracker.current().len(), 2);

        let taken = tracker.take();
        assert_eq!(taken.len(), 2);
        assert!(!tracker.is_dirty());
        assert!(tracker.mark(FieldId::new(3)));
    }
}
