use std::collections::BTreeSet;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::Error;

const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// A single kernel routing object the agent can own.
pub trait Entry: Clone + Debug + Display + Eq + Ord + Hash + Send + Sync + 'static {
    /// Whether `actual`, as read back from the kernel, is the kernel's
    /// rendition of this entry. Defaults to strict equality.
    fn matches_kernel(&self, actual: &Self) -> bool {
        self == actual
    }
}

/// Stable hash of an entry. Fixed seeds keep it identical between passes.
pub fn entry_hash<E: Hash>(entry: &E) -> u64 {
    ahash::RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]).hash_one(entry)
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Keyed<E> {
    hash: u64,
    entry: E,
}

impl<E: Entry> Keyed<E> {
    fn new(entry: E) -> Self {
        Self {
            hash: entry_hash(&entry),
            entry,
        }
    }
}

/// Set of entries keyed by their canonical hash.
///
/// Iteration follows hash order. Membership is decided by equality, the hash
/// only orders the set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryMap<E: Entry> {
    entries: BTreeSet<Keyed<E>>,
}

impl<E: Entry> Default for EntryMap<E> {
    fn default() -> Self {
        Self {
            entries: BTreeSet::new(),
        }
    }
}

impl<E: Entry> EntryMap<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the entry was not already present.
    pub fn insert(&mut self, entry: E) -> bool {
        self.entries.insert(Keyed::new(entry))
    }

    pub fn remove(&mut self, entry: &E) -> bool {
        self.entries.remove(&Keyed::new(entry.clone()))
    }

    pub fn contains(&self, entry: &E) -> bool {
        self.entries.contains(&Keyed::new(entry.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter().map(|k| &k.entry)
    }

    /// Entries of `self` that are absent from `other`.
    pub fn difference(&self, other: &EntryMap<E>) -> EntryMap<E> {
        self.iter()
            .filter(|e| !other.contains(e))
            .cloned()
            .collect()
    }

    /// Replaces every entry that is not literally present in `actual` with
    /// the kernel entry it matches, if any.
    pub fn resolve_against(&mut self, actual: &EntryMap<E>) {
        let resolved: EntryMap<E> = self
            .iter()
            .map(|entry| {
                if actual.contains(entry) {
                    return entry.clone();
                }
                actual
                    .iter()
                    .find(|candidate| entry.matches_kernel(candidate))
                    .cloned()
                    .unwrap_or_else(|| entry.clone())
            })
            .collect();
        *self = resolved;
    }
}

impl<E: Entry> FromIterator<E> for EntryMap<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut map = EntryMap::new();
        map.extend(iter);
        map
    }
}

impl<E: Entry> Extend<E> for EntryMap<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

impl<'a, E: Entry> Extend<&'a E> for EntryMap<E> {
    fn extend<I: IntoIterator<Item = &'a E>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry.clone());
        }
    }
}

/// Result of expanding a record's spec into concrete entries. Entries that
/// failed to parse are reported in `errors` and left out of `entries`.
#[derive(Clone, Debug)]
pub struct Expanded<E: Entry> {
    pub entries: EntryMap<E>,
    pub errors: Vec<Error>,
}

impl<E: Entry> Default for Expanded<E> {
    fn default() -> Self {
        Self {
            entries: EntryMap::new(),
            errors: Vec::new(),
        }
    }
}

impl<E: Entry> Expanded<E> {
    pub fn push(&mut self, entry: crate::Result<E>) {
        match entry {
            Ok(entry) => {
                self.entries.insert(entry);
            }
            Err(e) => self.errors.push(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::RouteEntry;

    fn route(dst: &str, gw: [u8; 4]) -> RouteEntry {
        RouteEntry::new(300, dst.parse().unwrap(), Ipv4Addr::from(gw))
    }

    #[test]
    fn test_entry_hash_is_stable() {
        let a = route("10.10.0.0/24", [10, 0, 0, 1]);
        assert_eq!(entry_hash(&a), entry_hash(&a.clone()));
        assert_ne!(
            entry_hash(&a),
            entry_hash(&route("10.20.0.0/24", [10, 0, 0, 1]))
        );
    }

    #[test]
    fn test_entry_map_set_semantics() {
        let mut map = EntryMap::new();
        assert!(map.insert(route("10.10.0.0/24", [10, 0, 0, 1])));
        assert!(!map.insert(route("10.10.0.0/24", [10, 0, 0, 1])));
        assert!(map.insert(route("10.20.0.0/24", [10, 0, 0, 2])));
        assert_eq!(map.len(), 2);
        assert!(map.contains(&route("10.20.0.0/24", [10, 0, 0, 2])));
        assert!(map.remove(&route("10.20.0.0/24", [10, 0, 0, 2])));
        assert!(!map.remove(&route("10.20.0.0/24", [10, 0, 0, 2])));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_entry_map_difference() {
        let left: EntryMap<_> = [
            route("10.10.0.0/24", [10, 0, 0, 1]),
            route("10.20.0.0/24", [10, 0, 0, 2]),
        ]
        .into_iter()
        .collect();
        let right: EntryMap<_> = [route("10.10.0.0/24", [10, 0, 0, 1])].into_iter().collect();

        let diff = left.difference(&right);
        assert_eq!(diff.len(), 1);
        assert!(diff.contains(&route("10.20.0.0/24", [10, 0, 0, 2])));
        assert!(right.difference(&left).is_empty());
    }

    #[test]
    fn test_entry_map_iterates_in_hash_order() {
        let map: EntryMap<_> = (1..=20u8)
            .map(|i| route(&format!("10.{i}.0.0/16"), [10, 0, 0, 1]))
            .collect();
        let hashes: Vec<u64> = map.iter().map(entry_hash).collect();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
    }
}
