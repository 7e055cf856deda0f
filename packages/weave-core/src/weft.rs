use std::cmp::Ordering;
use std::collections::HashMap;

use crate::ids::{AtomId, SiteId, YarnIndex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A causal frontier: the highest yarn index known for each site.
///
/// A weft includes atom `(s, i)` iff `mapping[s] >= i`. Wefts form a
/// join-semilattice under pointwise max (`merge`); `superset` is the
/// pointwise partial order. The total `cmp_lexicographic` order exists only
/// as a deterministic tiebreak proxy for "more aware" between mutually
/// unaware siblings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Weft {
    mapping: HashMap<SiteId, YarnIndex>,
}

impl Weft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest known index for `site`, if the site is known at all.
    pub fn get(&self, site: SiteId) -> Option<YarnIndex> {
        self.mapping.get(&site).copied()
    }

    /// Raise the frontier for `site` to at least `index`.
    pub fn update(&mut self, site: SiteId, index: YarnIndex) {
        let entry = self.mapping.entry(site).or_insert(index);
        *entry = (*entry).max(index);
    }

    pub fn update_atom(&mut self, id: AtomId) {
        self.update(id.site, id.index);
    }

    /// Whether the frontier covers `id`. The null id (`None`) is included in
    /// every weft; callers test causes and references without caring whether
    /// the link is present.
    pub fn includes(&self, id: Option<AtomId>) -> bool {
        match id {
            None => true,
            Some(id) => self.includes_id(id),
        }
    }

    pub fn includes_id(&self, id: AtomId) -> bool {
        self.mapping
            .get(&id.site)
            .is_some_and(|&index| index >= id.index)
    }

    /// Pointwise max join.
    pub fn merge(&mut self, other: &Weft) {
        for (&site, &index) in &other.mapping {
            self.update(site, index);
        }
    }

    /// Pointwise `>=`: every atom `other` includes, `self` includes too.
    pub fn superset(&self, other: &Weft) -> bool {
        other.mapping.iter().all(|(&site, &index)| {
            self.mapping.get(&site).is_some_and(|&own| own >= index)
        })
    }

    /// Total order over wefts: lexicographic over `(site, index)` pairs with
    /// sites sorted ascending. Only meaningful through
    /// [`Weft::more_aware_than`], where it breaks ties between pointwise
    /// incomparable wefts.
    pub fn cmp_lexicographic(&self, other: &Weft) -> Ordering {
        self.sorted_entries().cmp(&other.sorted_entries())
    }

    /// Deterministic "more aware" verdict between the awareness wefts of two
    /// sibling atoms: pointwise dominance when the wefts are comparable, the
    /// lexicographic tiebreak when they are not. Mutually unaware siblings
    /// always land in the tiebreak arm (each weft contains its own atom, so
    /// neither can dominate), which is what keeps the verdict identical on
    /// every replica. `None` for equal wefts; distinct atoms never have
    /// equal awareness in a well-formed weave.
    pub fn more_aware_than(&self, other: &Weft) -> Option<bool> {
        if self == other {
            return None;
        }
        if self.superset(other) {
            return Some(true);
        }
        if other.superset(self) {
            return Some(false);
        }
        Some(self.cmp_lexicographic(other) == Ordering::Greater)
    }

    pub fn entries(&self) -> impl Iterator<Item = (SiteId, YarnIndex)> + '_ {
        self.mapping.iter().map(|(&site, &index)| (site, index))
    }

    pub fn sorted_entries(&self) -> Vec<(SiteId, YarnIndex)> {
        let mut entries: Vec<_> = self.entries().collect();
        entries.sort_unstable();
        entries
    }

    pub fn site_count(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
