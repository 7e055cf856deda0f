use std::collections::{HashMap, HashSet};
use std::mem;
use std::ops::Range;

use crate::atom::{atom_sibling_order, unparented_atom_order, Atom, AtomType, AtomValue};
use crate::error::ValidationError;
use crate::ids::{AtomId, Clock, SiteId, YarnIndex, CONTROL_SITE, END_CLOCK, START_CLOCK};
use crate::weft::Weft;
use crate::yarns::YarnStore;

/// The weave: every atom of the causal tree in one canonical sequence.
///
/// The sequence is partitioned into a tree section (a depth-first
/// linearization of the causal tree, start atom first) followed by an
/// unparented section (commits and the end marker, id-ordered). The yarn
/// store and the weft are parallel views over the same atoms; all three move
/// together under every mutation.
///
/// One replica owns one weave and is its only writer. Replicas converge by
/// exchanging whole weaves and calling [`Weave::integrate`].
#[derive(Clone, Debug)]
pub struct Weave<V> {
    pub(crate) owner: SiteId,
    pub(crate) atoms: Vec<Atom<V>>,
    pub(crate) weft: Weft,
    pub(crate) yarns: YarnStore<V>,
}

impl<V: AtomValue> Weave<V> {
    /// A fresh weave seeded with the start and end atoms.
    pub fn new(owner: SiteId) -> Self {
        let start = Atom {
            id: AtomId::START,
            cause: Some(AtomId::START),
            clock: START_CLOCK,
            value: V::default(),
            reference: None,
            kind: AtomType::Start,
        };
        let end = Atom {
            id: AtomId::END,
            cause: None,
            clock: END_CLOCK,
            value: V::default(),
            reference: None,
            kind: AtomType::End,
        };

        let mut weave = Self {
            owner,
            atoms: Vec::new(),
            weft: Weft::new(),
            yarns: YarnStore::new(),
        };
        for atom in [start, end] {
            weave.weft.update_atom(atom.id);
            weave.yarns.append(atom.clone());
            weave.atoms.push(atom);
        }
        weave
    }

    /// Rebuild a weave from a previously serialized atom sequence. The
    /// sequence is adopted verbatim as the weave order and the caches are
    /// reconstructed; nothing is validated. Run [`Weave::validate`] before
    /// trusting foreign data.
    pub fn from_serialized(owner: SiteId, atoms: Vec<Atom<V>>) -> Self {
        let mut weft = Weft::new();
        for atom in &atoms {
            weft.update_atom(atom.id);
        }
        let yarns = YarnStore::rebuild(&atoms);
        Self {
            owner,
            atoms,
            weft,
            yarns,
        }
    }

    pub fn owner(&self) -> SiteId {
        self.owner
    }

    /// The canonical atom sequence. Two replicas have converged exactly when
    /// these slices are equal.
    pub fn weave(&self) -> &[Atom<V>] {
        &self.atoms
    }

    /// The causal frontier covering every atom in the weave.
    pub fn complete_weft(&self) -> Weft {
        self.weft.clone()
    }

    /// Whether this weave contains everything `other` does.
    pub fn superset(&self, other: &Weave<V>) -> bool {
        self.weft.superset(&other.weft)
    }

    pub fn atom_for_id(&self, id: AtomId) -> Option<&Atom<V>> {
        self.yarns.atom_for_id(id)
    }

    pub fn atom_yarns_index(&self, id: AtomId) -> Option<usize> {
        self.yarns.atom_yarns_index(id)
    }

    /// Position of `id` in the weave. Linear scan.
    pub fn atom_weave_index(&self, id: AtomId) -> Option<usize> {
        self.atoms.iter().position(|atom| atom.id == id)
    }

    pub fn last_site_atom_yarns_index(&self, site: SiteId) -> Option<usize> {
        self.yarns.last_site_atom_yarns_index(site)
    }

    pub fn yarn(&self, site: SiteId) -> &[Atom<V>] {
        self.yarns.yarn(site)
    }

    pub fn sites(&self) -> Vec<SiteId> {
        self.yarns.sites()
    }

    /// Rough memory footprint of the weave and its caches.
    pub fn size_in_bytes(&self) -> usize {
        (self.atoms.len() + self.yarns.len()) * mem::size_of::<Atom<V>>()
            + self.weft.site_count()
                * (mem::size_of::<SiteId>() + mem::size_of::<YarnIndex>())
    }

    /// Append a new atom owned by this replica under `cause`.
    ///
    /// Before the atom is created, one commit is synthesized per distinct
    /// foreign site with a child under the same cause. The commits make the
    /// new atom's awareness dominate every known sibling yarn, which is what
    /// lets remote merges order it deterministically against those siblings.
    ///
    /// Returns `None` when `cause` is unknown or cannot have children.
    pub fn add_atom(&mut self, value: V, cause: AtomId, clock: Clock) -> Option<AtomId> {
        let cause_atom = self.yarns.atom_for_id(cause)?;
        if cause_atom.kind.childless() || cause_atom.kind.unparented() {
            return None;
        }

        let mut sibling_sites: Vec<SiteId> = Vec::new();
        for atom in &self.atoms {
            if atom.cause != Some(cause) {
                continue;
            }
            let site = atom.id.site;
            if site != self.owner && site != CONTROL_SITE && !sibling_sites.contains(&site) {
                sibling_sites.push(site);
            }
        }
        for site in sibling_sites {
            self.add_commit(self.owner, site, clock)?;
        }

        let atom = Atom {
            id: self.next_id(self.owner),
            cause: Some(cause),
            clock,
            value,
            reference: None,
            kind: AtomType::Value,
        };
        self.integrate_atom(atom)
    }

    /// Mark `target` deleted by appending a tombstone child. Only
    /// payload-carrying atoms can be deleted; the target stays in the weave.
    pub fn delete_atom(&mut self, target: AtomId, clock: Clock) -> Option<AtomId> {
        let target_atom = self.yarns.atom_for_id(target)?;
        if target_atom.kind != AtomType::Value {
            return None;
        }

        let atom = Atom {
            id: self.next_id(self.owner),
            cause: Some(target),
            clock,
            value: V::default(),
            reference: None,
            kind: AtomType::Delete,
        };
        self.integrate_atom(atom)
    }

    /// Record that `from_site` has seen the whole of `to_site`'s yarn, as an
    /// unparented atom referencing that yarn's tail.
    pub fn add_commit(
        &mut self,
        from_site: SiteId,
        to_site: SiteId,
        clock: Clock,
    ) -> Option<AtomId> {
        if from_site == to_site {
            return None;
        }
        let target = self.yarns.last_site_atom(to_site)?.id;

        let atom = Atom {
            id: self.next_id(from_site),
            cause: None,
            clock,
            value: V::default(),
            reference: Some(target),
            kind: AtomType::Commit,
        };
        self.integrate_atom(atom)
    }

    fn next_id(&self, site: SiteId) -> AtomId {
        let index = self
            .yarns
            .last_yarn_index(site)
            .map_or(0, |index| index + 1);
        AtomId::new(site, index)
    }

    /// Place a freshly created atom into the weave and the caches.
    ///
    /// Tree atoms land as far forward under their cause as the canonical
    /// sibling order allows. That is directly after the cause, except that
    /// existing tombstone children keep their priority slot: a value atom
    /// goes behind all of them, a new tombstone behind just the ones that
    /// out-rank it. Everything else already under the cause must order after
    /// the new atom, which is strictly more aware of it. Unparented atoms
    /// land at their id-ordered slot in the tail section.
    fn integrate_atom(&mut self, atom: Atom<V>) -> Option<AtomId> {
        let position = if atom.kind.unparented() {
            if atom.cause.is_some() {
                return None;
            }
            let mut at = self.unparented_section_start();
            while at < self.atoms.len() && unparented_atom_order(self.atoms[at].id, atom.id) {
                at += 1;
            }
            at
        } else {
            let cause = atom.cause?;
            let cause_index = self.atom_weave_index(cause)?;
            let cause_kind = self.atoms[cause_index].kind;
            if cause_kind.childless() || cause_kind.unparented() {
                return None;
            }

            let mut at = cause_index + 1;
            let mut new_aw: Option<Weft> = None;
            while let Some(existing) = self.atoms.get(at) {
                if existing.cause != atom.cause || !existing.kind.priority() {
                    break;
                }
                if atom.kind.priority() {
                    if new_aw.is_none() {
                        new_aw = Some(self.fresh_atom_awareness(&atom)?);
                    }
                    let existing_aw = self.awareness_weft(existing.id)?;
                    if existing_aw.more_aware_than(new_aw.as_ref()?) != Some(true) {
                        break;
                    }
                }
                at += 1;
            }
            at
        };

        let id = atom.id;
        self.atoms.insert(position, atom.clone());
        self.yarns.append(atom);
        self.weft.update_atom(id);
        Some(id)
    }

    /// Awareness a not-yet-integrated atom will have: itself, its yarn
    /// predecessor's past, and the pasts of its links.
    fn fresh_atom_awareness(&self, atom: &Atom<V>) -> Option<Weft> {
        let mut weft = Weft::new();
        weft.update_atom(atom.id);
        if atom.id.index > 0 {
            let pred = AtomId::new(atom.id.site, atom.id.index - 1);
            weft.merge(&self.awareness_weft(pred)?);
        }
        if let Some(cause) = atom.cause {
            weft.merge(&self.awareness_weft(cause)?);
        }
        if let Some(reference) = atom.reference {
            weft.merge(&self.awareness_weft(reference)?);
        }
        Some(weft)
    }

    fn unparented_section_start(&self) -> usize {
        self.atoms
            .iter()
            .position(|atom| atom.kind.unparented())
            .unwrap_or(self.atoms.len())
    }

    /// The weft of every atom `id` transitively depends on, the atom itself
    /// included.
    ///
    /// Fixed point over wefts: each round walks the yarn stretches newly
    /// claimed by the frontier and collects their cross-site causes and weak
    /// references. Every yarn index is visited at most once, so the whole
    /// computation is O(N).
    pub fn awareness_weft(&self, id: AtomId) -> Option<Weft> {
        let seed = self.yarns.atom_for_id(id)?;
        let (seed_cause, seed_reference) = (seed.cause, seed.reference);

        let mut working = Weft::new();
        working.update_atom(id);
        let mut completed = Weft::new();

        while working != completed {
            let mut next = Weft::new();
            for (site, up_to) in working.entries() {
                let yarn = self.yarns.yarn(site);
                if up_to as usize >= yarn.len() {
                    return None;
                }
                let low = match completed.get(site) {
                    Some(done) if done >= up_to => continue,
                    Some(done) => done as usize + 1,
                    None => 0,
                };
                for atom in &yarn[low..=up_to as usize] {
                    if let Some(cause) = atom.cause {
                        if cause.site != site {
                            next.update_atom(cause);
                        }
                    }
                    if let Some(reference) = atom.reference {
                        next.update_atom(reference);
                    }
                }
            }
            next.merge(&working);
            completed.merge(&working);
            working = next;
        }

        if let Some(cause) = seed_cause {
            completed.update_atom(cause);
        }
        if let Some(reference) = seed_reference {
            completed.update_atom(reference);
        }
        Some(completed)
    }

    /// The contiguous weave range holding the subtree rooted at
    /// `weave_index`.
    ///
    /// Subtree membership is tracked directly: an atom belongs to the block
    /// iff its cause does. The tree section is a depth-first linearization,
    /// so the block ends at the first non-member (or at the unparented
    /// boundary). Childless roots span just themselves; unparented atoms
    /// have no causal block.
    pub fn causal_block(&self, weave_index: usize) -> Option<Range<usize>> {
        let root = self.atoms.get(weave_index)?;
        if root.kind.unparented() {
            return None;
        }
        if root.kind.childless() {
            return Some(weave_index..weave_index + 1);
        }

        let mut members = HashSet::with_capacity(8);
        members.insert(root.id);
        let mut end = weave_index + 1;
        while end < self.atoms.len() {
            let atom = &self.atoms[end];
            if atom.kind.unparented() {
                break;
            }
            match atom.cause {
                Some(cause) if members.contains(&cause) => {
                    members.insert(atom.id);
                    end += 1;
                }
                _ => break,
            }
        }
        Some(weave_index..end)
    }

    /// Renumber sites everywhere: the owner, every atom id, cause and
    /// reference, the weft, and the yarn map. The map must be injective over
    /// the sites it mentions; order-sensitive renumberings are the caller's
    /// problem (re-run `validate` when in doubt).
    pub fn remap_indices(&mut self, map: &HashMap<SiteId, SiteId>) {
        let remap = |site: &mut SiteId| {
            if let Some(&new) = map.get(site) {
                *site = new;
            }
        };

        remap(&mut self.owner);
        for atom in &mut self.atoms {
            remap(&mut atom.id.site);
            if let Some(cause) = &mut atom.cause {
                remap(&mut cause.site);
            }
            if let Some(reference) = &mut atom.reference {
                remap(&mut reference.site);
            }
        }
        self.yarns.remap_sites(map);

        let mut weft = Weft::new();
        for (mut site, index) in self.weft.entries() {
            remap(&mut site);
            weft.update(site, index);
        }
        self.weft = weft;
    }

    /// Check every structural invariant of the weave. Diagnostic; mutation
    /// and merge never run this on their own.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.atoms.len() < 2 {
            return Err(ValidationError::NoAtoms);
        }
        if self.yarns.site_count() == 0 {
            return Err(ValidationError::NoSites);
        }
        self.validate_caches()?;

        let mut index_of: HashMap<AtomId, usize> = HashMap::with_capacity(self.atoms.len());
        for (at, atom) in self.atoms.iter().enumerate() {
            if index_of.insert(atom.id, at).is_some() {
                return Err(ValidationError::LikelyCorruption);
            }
        }

        let first = &self.atoms[0];
        if first.id != AtomId::START
            || first.kind != AtomType::Start
            || first.cause != Some(AtomId::START)
        {
            return Err(ValidationError::LikelyCorruption);
        }

        let awareness = self.compute_all_awareness()?;

        let boundary = self.unparented_section_start();
        if boundary == self.atoms.len() || self.atoms[boundary].id != AtomId::END {
            return Err(ValidationError::MissingStartOfUnparentedSection);
        }

        // Tree section: causal order, DFS nesting, awareness of links.
        let mut children: HashMap<AtomId, Vec<usize>> = HashMap::new();
        let mut path: Vec<AtomId> = vec![first.id];
        for at in 1..boundary {
            let atom = &self.atoms[at];
            let cause = match atom.cause {
                Some(cause) => cause,
                None => return Err(ValidationError::TreeAtomIsUnparented(atom.id)),
            };
            let cause_index = match index_of.get(&cause) {
                Some(&index) => index,
                None => return Err(ValidationError::CausalityViolation(atom.id)),
            };
            if cause_index >= at {
                return Err(ValidationError::CausalityViolation(atom.id));
            }
            if self.atoms[cause_index].kind.childless() {
                return Err(ValidationError::ChildlessAtomHasChildren(cause));
            }

            while let Some(&top) = path.last() {
                if top == cause {
                    break;
                }
                path.pop();
            }
            if path.is_empty() {
                return Err(ValidationError::IncorrectTreeAtomOrder(atom.id));
            }
            path.push(atom.id);
            children.entry(cause).or_default().push(at);

            let aweft = self.awareness_for(&awareness, atom.id);
            if !aweft.includes_id(cause) {
                return Err(ValidationError::AtomUnawareOfParent(atom.id));
            }
            if !aweft.includes(atom.reference) {
                return Err(ValidationError::AtomUnawareOfReference(atom.id));
            }
        }

        // Sibling order, per parent, in weave appearance order.
        for siblings in children.values() {
            for pair in siblings.windows(2) {
                let left = &self.atoms[pair[0]];
                let right = &self.atoms[pair[1]];
                let verdict = self
                    .awareness_for(&awareness, left.id)
                    .more_aware_than(self.awareness_for(&awareness, right.id));
                match verdict {
                    Some(more_aware) if atom_sibling_order(left, right, more_aware) => {}
                    _ => return Err(ValidationError::IncorrectTreeAtomOrder(right.id)),
                }
            }
        }

        // Unparented section: null causes, unparented kinds, id order.
        for at in boundary..self.atoms.len() {
            let atom = &self.atoms[at];
            if !atom.kind.unparented() {
                return Err(ValidationError::TreeAtomIsUnparented(atom.id));
            }
            if atom.cause.is_some() {
                return Err(ValidationError::UnparentedAtomIsParented(atom.id));
            }
            if at > boundary && !unparented_atom_order(self.atoms[at - 1].id, atom.id) {
                return Err(ValidationError::IncorrectUnparentedAtomOrder(atom.id));
            }
            if !self.awareness_for(&awareness, atom.id).includes(atom.reference) {
                return Err(ValidationError::AtomUnawareOfReference(atom.id));
            }
        }

        Ok(())
    }

    fn validate_caches(&self) -> Result<(), ValidationError> {
        if self.atoms.len() != self.yarns.len() {
            return Err(ValidationError::LikelyCorruption);
        }
        for site in self.yarns.sites() {
            let yarn = self.yarns.yarn(site);
            for (offset, atom) in yarn.iter().enumerate() {
                if atom.id.site != site || atom.id.index as usize != offset {
                    return Err(ValidationError::LikelyCorruption);
                }
            }
            if self.weft.get(site) != Some((yarn.len() - 1) as YarnIndex) {
                return Err(ValidationError::LikelyCorruption);
            }
        }
        for atom in &self.atoms {
            if self.yarns.atom_for_id(atom.id).map(|cached| cached.id) != Some(atom.id) {
                return Err(ValidationError::LikelyCorruption);
            }
        }
        Ok(())
    }

    fn awareness_for<'a>(&self, awareness: &'a [Weft], id: AtomId) -> &'a Weft {
        &awareness[self.yarns.atom_yarns_index(id).expect("caches checked")]
    }

    /// Awareness for every atom, flat-yarn-indexed, computed in dependency
    /// order: a yarn advances only once the current atom's cause, yarn
    /// predecessor, and reference all have their awareness. A full
    /// round-robin pass with no progress means the dependencies cycle.
    fn compute_all_awareness(&self) -> Result<Vec<Weft>, ValidationError> {
        let total = self.yarns.len();
        let sites = self.yarns.sites();
        let mut awareness: Vec<Option<Weft>> = vec![None; total];
        let mut cursors: HashMap<SiteId, usize> = sites.iter().map(|&site| (site, 0)).collect();
        let mut done = 0usize;

        while done < total {
            let mut progressed = false;
            for &site in &sites {
                let yarn = self.yarns.yarn(site);
                let cursor = cursors.get_mut(&site).expect("cursor per site");
                'advance: while *cursor < yarn.len() {
                    let atom = &yarn[*cursor];
                    let mut combined = Weft::new();
                    combined.update_atom(atom.id);

                    if *cursor > 0 {
                        let pred = AtomId::new(site, (*cursor - 1) as YarnIndex);
                        let flat = self.yarns.atom_yarns_index(pred).expect("gapless yarn");
                        match &awareness[flat] {
                            Some(weft) => combined.merge(weft),
                            None => break 'advance,
                        }
                    }
                    for dep in [atom.cause, atom.reference] {
                        let Some(dep) = dep else { continue };
                        if dep == atom.id {
                            continue;
                        }
                        let Some(flat) = self.yarns.atom_yarns_index(dep) else {
                            return Err(ValidationError::CausalityViolation(atom.id));
                        };
                        match &awareness[flat] {
                            Some(weft) => combined.merge(weft),
                            None => break 'advance,
                        }
                    }

                    let flat = self
                        .yarns
                        .atom_yarns_index(atom.id)
                        .expect("atom from this yarn");
                    awareness[flat] = Some(combined);
                    *cursor += 1;
                    done += 1;
                    progressed = true;
                }
            }
            if !progressed {
                let stuck = sites
                    .iter()
                    .find_map(|&site| {
                        let cursor = cursors[&site];
                        self.yarns.yarn(site).get(cursor).map(|atom| atom.id)
                    })
                    .unwrap_or(AtomId::START);
                return Err(ValidationError::CausalityViolation(stuck));
            }
        }

        Ok(awareness.into_iter().map(|weft| weft.expect("all computed")).collect())
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use serde::de::Deserializer;
    use serde::ser::{SerializeStruct, Serializer};
    use serde::{Deserialize, Serialize};

    use super::Weave;
    use crate::atom::{Atom, AtomValue};
    use crate::ids::SiteId;

    #[derive(Deserialize)]
    #[serde(bound = "V: AtomValue")]
    struct WeaveRepr<V> {
        owner: SiteId,
        atoms: Vec<Atom<V>>,
    }

    impl<V: AtomValue> Serialize for Weave<V> {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut state = serializer.serialize_struct("Weave", 2)?;
            state.serialize_field("owner", &self.owner)?;
            state.serialize_field("atoms", &self.atoms)?;
            state.end()
        }
    }

    impl<'de, V: AtomValue> Deserialize<'de> for Weave<V> {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let repr = WeaveRepr::<V>::deserialize(deserializer)?;
            Ok(Weave::from_serialized(repr.owner, repr.atoms))
        }
    }
}
