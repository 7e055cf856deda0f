use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Replica identifier. The site-UUID to site-id mapping lives outside the
/// core; in here a site is just a small integer.
pub type SiteId = u16;

/// Per-site sequence number. Yarns are gapless and 0-based, so this doubles
/// as an offset into the owning site's yarn.
pub type YarnIndex = u32;

/// Lamport-style timestamp carried by every atom. Informational only: the
/// weave orders atoms by causality and the canonical sibling order, never by
/// clock.
pub type Clock = u64;

/// The site that owns the start and end atoms. No user atoms are ever
/// created under this id.
pub const CONTROL_SITE: SiteId = 0;

/// Reserved clock of the start atom.
pub const START_CLOCK: Clock = 1;

/// Reserved clock of the end atom.
pub const END_CLOCK: Clock = 2;

/// Globally unique atom identifier.
///
/// The derived ordering (site ascending, then index ascending) is the
/// canonical order of the unparented weave section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AtomId {
    pub site: SiteId,
    pub index: YarnIndex,
}

impl AtomId {
    pub fn new(site: SiteId, index: YarnIndex) -> Self {
        Self { site, index }
    }

    /// Id of the start atom, always at weave index 0.
    pub const START: AtomId = AtomId {
        site: CONTROL_SITE,
        index: 0,
    };

    /// Id of the end atom, always the first atom of the unparented section.
    pub const END: AtomId = AtomId {
        site: CONTROL_SITE,
        index: 1,
    };
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.site, self.index)
    }
}
