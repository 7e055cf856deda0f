//! The join of two weaves: a single two-pointer pass over both
//! linearizations that yields a set of insertion runs, applied back to front.
//!
//! The pass only reads; every way it can fail is exhausted before the local
//! weave is touched, so an error leaves the replica exactly as it was.

use std::cmp::Ordering;
use std::ops::Range;

use log::debug;

use crate::atom::{atom_sibling_order, AtomValue};
use crate::error::MergeError;
use crate::weave::Weave;

/// A contiguous slice of remote atoms destined for one local position.
#[derive(Debug)]
struct InsertionRun {
    local_index: usize,
    remote: Range<usize>,
}

/// Accumulates insertions during the walk, coalescing adjacent remote atoms
/// aimed at the same local index into single runs.
#[derive(Debug, Default)]
struct InsertionRuns {
    committed: Vec<InsertionRun>,
    pending: Option<InsertionRun>,
}

impl InsertionRuns {
    fn push(&mut self, local_index: usize, remote: Range<usize>) {
        if let Some(pending) = &mut self.pending {
            if pending.local_index == local_index && pending.remote.end == remote.start {
                pending.remote.end = remote.end;
                return;
            }
        }
        self.commit();
        self.pending = Some(InsertionRun {
            local_index,
            remote,
        });
    }

    fn commit(&mut self) {
        if let Some(run) = self.pending.take() {
            self.committed.push(run);
        }
    }

    fn finish(mut self) -> Vec<InsertionRun> {
        self.commit();
        self.committed
    }
}

impl<V: AtomValue> Weave<V> {
    /// Merge `other` into this weave.
    ///
    /// Deterministic, commutative, associative, and idempotent over valid
    /// weaves: both replicas end up with the same linearization no matter
    /// which direction they merge. An error means the inputs disagree in a
    /// way valid weaves cannot, and leaves this weave unchanged. Callers
    /// holding an untrusted remote should `validate` it first.
    pub fn integrate(&mut self, other: &Weave<V>) -> Result<(), MergeError> {
        let local_weft = self.complete_weft();
        let remote_weft = other.complete_weft();

        let runs = {
            let local = self.weave();
            let remote = other.weave();
            let mut runs = InsertionRuns::default();
            let mut i = 0usize;
            let mut j = 0usize;

            while j < remote.len() {
                if i >= local.len() {
                    // Local exhausted; the rest of remote is its unparented
                    // tail (or atoms already committed above).
                    runs.push(i, j..j + 1);
                    j += 1;
                } else if local[i].id == remote[j].id {
                    runs.commit();
                    i += 1;
                    j += 1;
                } else if local[i].kind.unparented() && remote[j].kind.unparented() {
                    // Both in the id-ordered tail section.
                    match local[i].id.cmp(&remote[j].id) {
                        Ordering::Less => {
                            runs.commit();
                            i += 1;
                        }
                        Ordering::Greater => {
                            runs.push(i, j..j + 1);
                            j += 1;
                        }
                        Ordering::Equal => {
                            runs.commit();
                            i += 1;
                            j += 1;
                        }
                    }
                } else if local_weft.includes_id(remote[j].id) {
                    // Remote atom already lives further down the local weave;
                    // everything local up to it must be missing from remote.
                    runs.commit();
                    let target = remote[j].id;
                    while i < local.len() && local[i].id != target {
                        i += 1;
                    }
                    if i == local.len() {
                        return Err(MergeError::MissingAtom(target));
                    }
                } else if remote_weft.includes_id(local[i].id) {
                    // Symmetric: remote placed atoms before one we share.
                    let target = local[i].id;
                    while j < remote.len() && remote[j].id != target {
                        runs.push(i, j..j + 1);
                        j += 1;
                    }
                    if j == remote.len() {
                        return Err(MergeError::MissingAtom(target));
                    }
                } else if local[i].cause.is_some() && local[i].cause == remote[j].cause {
                    // Mutually unaware siblings: order whole causal blocks by
                    // the canonical sibling order. Awareness wefts are
                    // intrinsic to the atoms, so both replicas pick the same
                    // winner.
                    let local_id = local[i].id;
                    let remote_id = remote[j].id;
                    let local_aw = self
                        .awareness_weft(local_id)
                        .ok_or(MergeError::MissingAwareness(local_id))?;
                    let remote_aw = other
                        .awareness_weft(remote_id)
                        .ok_or(MergeError::MissingAwareness(remote_id))?;
                    let local_block = self
                        .causal_block(i)
                        .ok_or(MergeError::MissingAwareness(local_id))?;
                    let remote_block = other
                        .causal_block(j)
                        .ok_or(MergeError::MissingAwareness(remote_id))?;

                    let local_first = match local_aw.more_aware_than(&remote_aw) {
                        None => {
                            return Err(MergeError::AmbiguousSiblingOrder {
                                local: local_id,
                                remote: remote_id,
                            })
                        }
                        Some(more_aware) => {
                            atom_sibling_order(&local[i], &remote[j], more_aware)
                        }
                    };
                    if local_first {
                        runs.commit();
                        i = local_block.end;
                    } else {
                        runs.push(i, remote_block.clone());
                        j = remote_block.end;
                    }
                } else {
                    // Unequal, mutually unaware, not siblings: one of the
                    // weaves is corrupt.
                    return Err(MergeError::IncomparableAtoms {
                        local: local[i].id,
                        remote: remote[j].id,
                    });
                }
            }
            runs.finish()
        };

        // Read-only phase over; graft yarns (prefix-checked before any
        // mutation), then splice the weave, then join the frontier.
        self.yarns.extend_from(&other.yarns)?;

        let inserted: usize = runs.iter().map(|run| run.remote.len()).sum();
        for run in runs.iter().rev() {
            self.atoms.splice(
                run.local_index..run.local_index,
                other.atoms[run.remote.clone()].iter().cloned(),
            );
        }
        self.weft.merge(&other.weft);

        debug!(
            "integrated {} remote atoms over {} runs from site {}",
            inserted,
            runs.len(),
            other.owner()
        );
        Ok(())
    }
}
