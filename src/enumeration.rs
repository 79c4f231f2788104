//! Ordered enumeration sidecar (§4.7).
//!
//! This tree is treated as a black-box ordered map, reusing a mature
//! ordered-map primitive rather than a hand-rolled balanced tree —
//! `rotonda-store`'s own `src/bin/load_mrt.rs` reaches for
//! `std::collections::BTreeSet` for exactly this kind of externally-ordered
//! prefix bookkeeping, so this sidecar is a `BTreeSet` keyed by a small
//! wrapper type whose `Ord` implements the composite comparator.
//!
//! The façade owns one of these per backend and keeps it in sync with
//! every insert/delete under the same write lock (§4.7); this module has
//! no knowledge of locking at all.

use std::collections::BTreeSet;
use std::ops::Bound;

use crate::types::af::AddressFamily;
use crate::types::prefix::PrefixKey;

/// The composite enumeration key: prefix length descending, then masked
/// prefix bits ascending (§6 "Ordered enumeration order"). `Ord` is
/// implemented so that `BTreeSet`'s natural ascending iteration already
/// produces "first" / "next" in exactly that order.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct EnumKey<AF: AddressFamily> {
    len: u8,
    bits: AF,
}

impl<AF: AddressFamily> Ord for EnumKey<AF> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.len.cmp(&self.len).then_with(|| self.bits.cmp(&other.bits))
    }
}

impl<AF: AddressFamily> PartialOrd for EnumKey<AF> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<AF: AddressFamily> From<PrefixKey<AF>> for EnumKey<AF> {
    fn from(key: PrefixKey<AF>) -> Self {
        Self {
            len: key.len(),
            bits: key.bits(),
        }
    }
}

/// The ordered set of every live route's `(prefix_length, prefix)`,
/// driving `route_first_get` / `route_next_get`.
#[derive(Default)]
pub struct EnumerationTree<AF: AddressFamily> {
    keys: BTreeSet<EnumKey<AF>>,
}

impl<AF: AddressFamily> EnumerationTree<AF> {
    pub fn new() -> Self {
        Self {
            keys: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, key: PrefixKey<AF>) {
        self.keys.insert(key.into());
    }

    pub fn remove(&mut self, key: PrefixKey<AF>) {
        self.keys.remove(&EnumKey::from(key));
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// The entry with the largest prefix length and, among those, the
    /// smallest masked prefix (§4.7 "First").
    pub fn first(&self) -> Option<PrefixKey<AF>> {
        self.keys.iter().next().map(|k| PrefixKey::new(k.bits, k.len))
    }

    /// The strictly-greater entry under the composite ordering, or `None`
    /// if `after` is the last entry (§4.7 "Next").
    pub fn next_after(&self, after: PrefixKey<AF>) -> Option<PrefixKey<AF>> {
        let probe = EnumKey::from(after);
        self.keys
            .range((Bound::Excluded(probe), Bound::Unbounded))
            .next()
            .map(|k| PrefixKey::new(k.bits, k.len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::af::Ipv4Family;

    #[test]
    fn orders_by_length_desc_then_prefix_asc() {
        let mut tree: EnumerationTree<Ipv4Family> = EnumerationTree::new();
        tree.insert(PrefixKey::new(Ipv4Family(0x0A000000), 8));
        tree.insert(PrefixKey::new(Ipv4Family(0x0B000000), 16));
        tree.insert(PrefixKey::new(Ipv4Family(0x0A000000), 16));

        let first = tree.first().unwrap();
        assert_eq!(first.len(), 16);
        assert_eq!(first.bits().0, 0x0A000000);

        let second = tree.next_after(first).unwrap();
        assert_eq!(second.len(), 16);
        assert_eq!(second.bits().0, 0x0B000000);

        let third = tree.next_after(second).unwrap();
        assert_eq!(third.len(), 8);

        assert!(tree.next_after(third).is_none());
    }

    #[test]
    fn remove_drops_from_enumeration() {
        let mut tree: EnumerationTree<Ipv4Family> = EnumerationTree::new();
        let a = PrefixKey::new(Ipv4Family(0x0A000000), 8);
        tree.insert(a);
        assert_eq!(tree.len(), 1);
        tree.remove(a);
        assert!(tree.is_empty());
    }
}
