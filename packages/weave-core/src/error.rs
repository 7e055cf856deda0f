use thiserror::Error;

use crate::ids::{AtomId, SiteId};

/// Structural defects reported by `Weave::validate`. These are diagnostics
/// over a finished weave; normal operations never return them.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("weave has no atoms")]
    NoAtoms,
    #[error("weave has no sites")]
    NoSites,
    #[error("atom {0} depends on atoms that never resolve")]
    CausalityViolation(AtomId),
    #[error("atom {0} is not aware of its cause")]
    AtomUnawareOfParent(AtomId),
    #[error("atom {0} is not aware of its reference")]
    AtomUnawareOfReference(AtomId),
    #[error("childless atom {0} has children")]
    ChildlessAtomHasChildren(AtomId),
    #[error("tree atom {0} has no cause or sits in the unparented section")]
    TreeAtomIsUnparented(AtomId),
    #[error("unparented atom {0} has a cause")]
    UnparentedAtomIsParented(AtomId),
    #[error("atom {0} breaks the tree section order")]
    IncorrectTreeAtomOrder(AtomId),
    #[error("atom {0} breaks the unparented section order")]
    IncorrectUnparentedAtomOrder(AtomId),
    #[error("unparented section does not begin with the end atom")]
    MissingStartOfUnparentedSection,
    #[error("weave caches are internally inconsistent")]
    LikelyCorruption,
}

/// Failures of `Weave::integrate`. Any of these marks the remote weave (or
/// the pair) as malformed; the local weave is left untouched when one is
/// returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeError {
    #[error("atoms {local} and {remote} are mutually unaware and not siblings")]
    IncomparableAtoms { local: AtomId, remote: AtomId },
    #[error("sibling atoms {local} and {remote} have identical awareness")]
    AmbiguousSiblingOrder { local: AtomId, remote: AtomId },
    #[error("no awareness weft for atom {0}")]
    MissingAwareness(AtomId),
    #[error("atom {0} not found ahead of the merge cursor")]
    MissingAtom(AtomId),
    #[error("yarns for site {0} disagree on a shared prefix")]
    YarnPrefixMismatch(SiteId),
}
