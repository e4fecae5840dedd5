use std::collections::HashSet;
use std::hash::Hash;

/// The per-tick change to a [`SetOutput`](super::output::SetOutput): the
/// elements added and removed since the previous tick. Mirrors the
/// reference implementation's `SetDelta`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SetDelta<T: Eq + Hash> {
    pub added: HashSet<T>,
    pub removed: HashSet<T>,
}

impl<T: Eq + Hash + Clone> SetDelta<T> {
    pub fn added(added: impl IntoIterator<Item = T>) -> Self {
        Self {
            added: added.into_iter().collect(),
            removed: HashSet::new(),
        }
    }

    pub fn removed(removed: impl IntoIterator<Item = T>) -> Self {
        Self {
            added: HashSet::new(),
            removed: removed.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
