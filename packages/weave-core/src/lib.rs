#![forbid(unsafe_code)]
//! Causal tree weave: a convergent replicated ordered document.
//!
//! Every replica (site) appends immutable atoms to its own yarn; the weave is
//! the canonical depth-first linearization of the causal tree those atoms
//! form, followed by an id-ordered tail of unparented atoms. Replicas
//! exchange whole weaves and join them with [`Weave::integrate`], a
//! deterministic, commutative, associative, idempotent merge. The core stays
//! independent of transport, persistence, and the meaning of atom values so
//! it can sit under any collaboration layer that can satisfy [`AtomValue`].

pub mod atom;
pub mod clock;
pub mod error;
pub mod ids;
pub mod merge;
pub mod weave;
pub mod weft;
pub mod yarns;

pub use atom::{atom_sibling_order, unparented_atom_order, Atom, AtomType, AtomValue};
pub use clock::{ClockSource, LamportClock};
pub use error::{MergeError, ValidationError};
pub use ids::{AtomId, Clock, SiteId, YarnIndex, CONTROL_SITE, END_CLOCK, START_CLOCK};
pub use weave::Weave;
pub use weft::Weft;
pub use yarns::YarnStore;
