use std::fmt;

use crate::ids::{AtomId, Clock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capability bound for atom payloads. The core never inspects values; it
/// only needs to default-construct them for control and tombstone atoms and
/// move them through merges and serialization.
#[cfg(not(feature = "serde"))]
pub trait AtomValue: Clone + Default + PartialEq + fmt::Debug {}
#[cfg(not(feature = "serde"))]
impl<T> AtomValue for T where T: Clone + Default + PartialEq + fmt::Debug {}

/// Capability bound for atom payloads. The core never inspects values; it
/// only needs to default-construct them for control and tombstone atoms and
/// move them through merges and serialization.
#[cfg(feature = "serde")]
pub trait AtomValue:
    Clone + Default + PartialEq + fmt::Debug + Serialize + serde::de::DeserializeOwned
{
}
#[cfg(feature = "serde")]
impl<T> AtomValue for T where
    T: Clone + Default + PartialEq + fmt::Debug + Serialize + serde::de::DeserializeOwned
{
}

/// Closed set of atom kinds. The three facet predicates drive ordering and
/// validation; they are total over the enum, so no dynamic dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AtomType {
    /// Root of the causal tree, `(0, 0)`, caused by itself.
    Start,
    /// First atom of the unparented section, `(0, 1)`.
    End,
    /// Ordinary payload-carrying atom.
    Value,
    /// Tombstone; its cause is the deleted atom.
    Delete,
    /// Awareness marker; references the tail of another site's yarn.
    Commit,
}

impl AtomType {
    /// Lives in the id-ordered tail section instead of the causal tree.
    pub fn unparented(self) -> bool {
        matches!(self, AtomType::Commit | AtomType::End)
    }

    /// May not cause other atoms.
    pub fn childless(self) -> bool {
        matches!(self, AtomType::Delete | AtomType::End)
    }

    /// Sorts before non-priority siblings regardless of awareness.
    pub fn priority(self) -> bool {
        matches!(self, AtomType::Delete)
    }
}

/// Immutable unit of the causal tree.
///
/// `cause` is `None` only for unparented atoms; `reference` is a weak link
/// that implies awareness but not tree structure (commit targets).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Atom<V> {
    pub id: AtomId,
    pub cause: Option<AtomId>,
    pub clock: Clock,
    pub value: V,
    pub reference: Option<AtomId>,
    pub kind: AtomType,
}

/// Canonical order between two sibling atoms (atoms sharing a cause).
///
/// Returns true when `a1` sorts strictly before `a2`. `a1_more_aware` is the
/// caller's verdict on the awareness tiebreak; awareness wefts are intrinsic
/// to atoms, so every replica passes the same answer for the same pair.
/// Distinct siblings with equal priority and equal awareness cannot occur in
/// a well-formed weave.
pub fn atom_sibling_order<V>(a1: &Atom<V>, a2: &Atom<V>, a1_more_aware: bool) -> bool {
    if a1.id == a2.id {
        return false;
    }
    match (a1.kind.priority(), a2.kind.priority()) {
        (true, false) => true,
        (false, true) => false,
        _ => a1_more_aware,
    }
}

/// Canonical order of the unparented section: lexicographic on `(site,
/// index)`. Returns true when `a1` sorts strictly before `a2`.
pub fn unparented_atom_order(a1: AtomId, a2: AtomId) -> bool {
    a1 < a2
}
