use std::collections::HashMap;

use crate::atom::Atom;
use crate::error::MergeError;
use crate::ids::{AtomId, SiteId, YarnIndex};

/// Contiguous slice of the flat yarn vector owned by one site, bounds
/// inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct YarnRange {
    lo: usize,
    hi: usize,
}

impl YarnRange {
    fn len(self) -> usize {
        self.hi - self.lo + 1
    }
}

/// Per-site atom arena: every site's yarn lives as one contiguous,
/// index-ordered slice of a single flat vector, so any `AtomId` resolves to
/// an atom in O(1). Site slices appear in arbitrary order.
#[derive(Clone, Debug, Default)]
pub struct YarnStore<V> {
    atoms: Vec<Atom<V>>,
    ranges: HashMap<SiteId, YarnRange>,
}

impl<V: Clone + PartialEq> YarnStore<V> {
    pub fn new() -> Self {
        Self {
            atoms: Vec::new(),
            ranges: HashMap::new(),
        }
    }

    /// Rebuild the arena from atoms in weave order (cache reconstruction on
    /// deserialization). Yarns are re-sorted by index; sites are laid out in
    /// ascending id order.
    pub fn rebuild(weave_atoms: &[Atom<V>]) -> Self {
        let mut buckets: HashMap<SiteId, Vec<Atom<V>>> = HashMap::new();
        for atom in weave_atoms {
            buckets.entry(atom.id.site).or_default().push(atom.clone());
        }

        let mut sites: Vec<SiteId> = buckets.keys().copied().collect();
        sites.sort_unstable();

        let mut store = Self::new();
        for site in sites {
            let mut yarn = buckets.remove(&site).unwrap_or_default();
            yarn.sort_unstable_by_key(|atom| atom.id.index);
            let lo = store.atoms.len();
            store.atoms.extend(yarn);
            let hi = store.atoms.len() - 1;
            store.ranges.insert(site, YarnRange { lo, hi });
        }
        store
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn site_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn sites(&self) -> Vec<SiteId> {
        let mut sites: Vec<SiteId> = self.ranges.keys().copied().collect();
        sites.sort_unstable();
        sites
    }

    /// Flat-vector position of `id`, rejecting out-of-range indices.
    pub fn atom_yarns_index(&self, id: AtomId) -> Option<usize> {
        let range = self.ranges.get(&id.site)?;
        let offset = id.index as usize;
        if offset >= range.len() {
            return None;
        }
        Some(range.lo + offset)
    }

    pub fn atom_for_id(&self, id: AtomId) -> Option<&Atom<V>> {
        self.atom_yarns_index(id).map(|i| &self.atoms[i])
    }

    /// The site's yarn in increasing yarn-index order; empty for unknown
    /// sites.
    pub fn yarn(&self, site: SiteId) -> &[Atom<V>] {
        match self.ranges.get(&site) {
            Some(range) => &self.atoms[range.lo..=range.hi],
            None => &[],
        }
    }

    pub fn yarn_len(&self, site: SiteId) -> usize {
        self.ranges.get(&site).map_or(0, |range| range.len())
    }

    pub fn last_site_atom_yarns_index(&self, site: SiteId) -> Option<usize> {
        self.ranges.get(&site).map(|range| range.hi)
    }

    pub fn last_site_atom(&self, site: SiteId) -> Option<&Atom<V>> {
        self.last_site_atom_yarns_index(site).map(|i| &self.atoms[i])
    }

    /// Highest yarn index present for `site`.
    pub fn last_yarn_index(&self, site: SiteId) -> Option<YarnIndex> {
        self.last_site_atom(site).map(|atom| atom.id.index)
    }

    /// Append one atom to its site's yarn. The atom's index must be the next
    /// one for the site (yarns stay gapless).
    pub fn append(&mut self, atom: Atom<V>) {
        let site = atom.id.site;
        match self.ranges.get(&site).copied() {
            Some(range) => {
                debug_assert_eq!(atom.id.index as usize, range.len());
                self.atoms.insert(range.hi + 1, atom);
                self.shift_after(range.hi, 1);
                self.ranges.entry(site).and_modify(|r| r.hi += 1);
            }
            None => {
                debug_assert_eq!(atom.id.index, 0);
                let lo = self.atoms.len();
                self.atoms.push(atom);
                self.ranges.insert(site, YarnRange { lo, hi: lo });
            }
        }
    }

    /// Post-merge extension: graft every yarn tail `other` has beyond the
    /// local frontier, and adopt sites unique to `other`. Shared prefixes
    /// must agree atom-for-atom at the boundary; on mismatch nothing is
    /// mutated.
    pub fn extend_from(&mut self, other: &YarnStore<V>) -> Result<(), MergeError> {
        let sites = other.sites();

        for &site in &sites {
            let local_len = self.yarn_len(site);
            if local_len == 0 {
                continue;
            }
            let remote = other.yarn(site);
            let shared = local_len.min(remote.len());
            if shared == 0 {
                continue;
            }
            if self.yarn(site)[shared - 1] != remote[shared - 1] {
                return Err(MergeError::YarnPrefixMismatch(site));
            }
        }

        for &site in &sites {
            let remote = other.yarn(site);
            match self.ranges.get(&site).copied() {
                Some(range) => {
                    let local_len = range.len();
                    if remote.len() <= local_len {
                        continue;
                    }
                    let tail = &remote[local_len..];
                    let at = range.hi + 1;
                    self.atoms.splice(at..at, tail.iter().cloned());
                    self.shift_after(range.hi, tail.len());
                    self.ranges
                        .entry(site)
                        .and_modify(|r| r.hi += tail.len());
                }
                None => {
                    let lo = self.atoms.len();
                    self.atoms.extend(remote.iter().cloned());
                    let hi = self.atoms.len() - 1;
                    self.ranges.insert(site, YarnRange { lo, hi });
                }
            }
        }
        Ok(())
    }

    /// Renumber sites everywhere in the arena. The map must be injective
    /// over the sites it mentions; unmapped sites keep their ids.
    pub fn remap_sites(&mut self, map: &HashMap<SiteId, SiteId>) {
        let remap = |site: &mut SiteId| {
            if let Some(&new) = map.get(site) {
                *site = new;
            }
        };
        for atom in &mut self.atoms {
            remap(&mut atom.id.site);
            if let Some(cause) = &mut atom.cause {
                remap(&mut cause.site);
            }
            if let Some(reference) = &mut atom.reference {
                remap(&mut reference.site);
            }
        }
        let ranges = std::mem::take(&mut self.ranges);
        self.ranges = ranges
            .into_iter()
            .map(|(mut site, range)| {
                remap(&mut site);
                (site, range)
            })
            .collect();
    }

    fn shift_after(&mut self, boundary: usize, by: usize) {
        for range in self.ranges.values_mut() {
            if range.lo > boundary {
                range.lo += by;
                range.hi += by;
            }
        }
    }
}
