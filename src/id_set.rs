//! Growable id sets with an accumulate, freeze, then query lifecycle.
//!
//! Ids are appended to an [`IdCollector`] while a pass runs. Once the pass is complete the
//! collector is frozen into an [`IdSet`], which is sorted and free of duplicates and only
//! answers membership queries. Only a frozen set can be handed to a later pass.

use std::slice;

#[derive(Debug, Clone)]
pub struct IdCollector<T> {
    ids: Vec<T>,
}

impl<T: Ord + Copy> IdCollector<T> {
    pub fn new() -> Self {
        IdCollector { ids: Vec::new() }
    }

    pub fn push(&mut self, id: T) {
        self.ids.push(id);
    }

    /// Number of ids collected so far, duplicates included.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sorts, removes duplicates and releases spare capacity.
    pub fn freeze(self) -> IdSet<T> {
        let mut ids = self.ids;
        ids.sort_unstable();
        ids.dedup();
        ids.shrink_to_fit();
        IdSet { ids }
    }
}

impl<T: Ord + Copy> Default for IdCollector<T> {
    fn default() -> Self {
        IdCollector::new()
    }
}

impl<T: Ord + Copy> Extend<T> for IdCollector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.ids.extend(iter);
    }
}

impl<T: Ord + Copy> FromIterator<T> for IdCollector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        IdCollector {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Immutable, sorted, duplicate free id set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSet<T> {
    ids: Vec<T>,
}

impl<T: Ord + Copy> IdSet<T> {
    pub fn contains(&self, id: T) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in ascending order.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.ids.iter()
    }

    /// Reopens the set for appending. The next `freeze` merges old and new ids.
    pub fn into_collector(self) -> IdCollector<T> {
        IdCollector { ids: self.ids }
    }
}

impl<T: Ord + Copy> Default for IdSet<T> {
    fn default() -> Self {
        IdSet { ids: Vec::new() }
    }
}

impl<'a, T: Ord + Copy> IntoIterator for &'a IdSet<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
