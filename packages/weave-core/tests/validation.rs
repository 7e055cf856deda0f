use weave_core::{Atom, AtomId, AtomType, ValidationError, Weave};

fn atom(site: u16, index: u32, cause: Option<AtomId>, kind: AtomType) -> Atom<u8> {
    Atom {
        id: AtomId::new(site, index),
        cause,
        clock: 0,
        value: 0,
        reference: None,
        kind,
    }
}

fn start_atom() -> Atom<u8> {
    atom(0, 0, Some(AtomId::START), AtomType::Start)
}

fn end_atom() -> Atom<u8> {
    atom(0, 1, None, AtomType::End)
}

fn commit_atom(site: u16, index: u32, reference: AtomId) -> Atom<u8> {
    let mut commit = atom(site, index, None, AtomType::Commit);
    commit.reference = Some(reference);
    commit
}

#[test]
fn minimal_weave_is_valid() {
    let weave = Weave::from_serialized(1, vec![start_atom(), end_atom()]);
    weave.validate().unwrap();
}

#[test]
fn empty_and_single_atom_weaves_are_rejected() {
    let weave: Weave<u8> = Weave::from_serialized(1, Vec::new());
    assert_eq!(weave.validate(), Err(ValidationError::NoAtoms));

    let weave = Weave::from_serialized(1, vec![start_atom()]);
    assert_eq!(weave.validate(), Err(ValidationError::NoAtoms));
}

#[test]
fn missing_end_atom_is_rejected() {
    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            atom(1, 0, Some(AtomId::START), AtomType::Value),
        ],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::MissingStartOfUnparentedSection)
    );
}

#[test]
fn tree_atom_without_cause_is_rejected() {
    let weave = Weave::from_serialized(
        1,
        vec![start_atom(), atom(1, 0, None, AtomType::Value), end_atom()],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::TreeAtomIsUnparented(AtomId::new(1, 0)))
    );
}

#[test]
fn tree_atom_in_the_tail_section_is_rejected() {
    let weave = Weave::from_serialized(
        1,
        vec![start_atom(), end_atom(), atom(1, 0, None, AtomType::Value)],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::TreeAtomIsUnparented(AtomId::new(1, 0)))
    );
}

#[test]
fn parented_commit_is_rejected() {
    let mut bad = commit_atom(1, 0, AtomId::START);
    bad.cause = Some(AtomId::START);
    let weave = Weave::from_serialized(1, vec![start_atom(), end_atom(), bad]);
    assert_eq!(
        weave.validate(),
        Err(ValidationError::UnparentedAtomIsParented(AtomId::new(1, 0)))
    );
}

#[test]
fn children_of_childless_atoms_are_rejected() {
    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            atom(1, 0, Some(AtomId::START), AtomType::Value),
            atom(2, 0, Some(AtomId::new(1, 0)), AtomType::Delete),
            atom(3, 0, Some(AtomId::new(2, 0)), AtomType::Value),
            end_atom(),
        ],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::ChildlessAtomHasChildren(AtomId::new(2, 0)))
    );
}

#[test]
fn dangling_cause_is_a_causality_violation() {
    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            atom(1, 0, Some(AtomId::new(5, 5)), AtomType::Value),
            end_atom(),
        ],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::CausalityViolation(AtomId::new(1, 0)))
    );
}

#[test]
fn cause_after_effect_is_a_causality_violation() {
    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            atom(1, 1, Some(AtomId::new(1, 0)), AtomType::Value),
            atom(1, 0, Some(AtomId::START), AtomType::Value),
            end_atom(),
        ],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::CausalityViolation(AtomId::new(1, 1)))
    );
}

#[test]
fn sibling_order_violation_is_rejected() {
    // Mutually unaware siblings tie-break toward the higher site, so site
    // 1's atom must not precede site 2's.
    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            atom(1, 0, Some(AtomId::START), AtomType::Value),
            atom(2, 0, Some(AtomId::START), AtomType::Value),
            end_atom(),
        ],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::IncorrectTreeAtomOrder(AtomId::new(2, 0)))
    );

    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            atom(2, 0, Some(AtomId::START), AtomType::Value),
            atom(1, 0, Some(AtomId::START), AtomType::Value),
            end_atom(),
        ],
    );
    weave.validate().unwrap();
}

#[test]
fn interleaved_subtrees_are_rejected() {
    // y's subtree must be contiguous with its cause's block; x cuts it off.
    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            atom(1, 0, Some(AtomId::START), AtomType::Value),
            atom(2, 0, Some(AtomId::START), AtomType::Value),
            atom(2, 1, Some(AtomId::new(1, 0)), AtomType::Value),
            end_atom(),
        ],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::IncorrectTreeAtomOrder(AtomId::new(2, 1)))
    );
}

#[test]
fn unsorted_unparented_tail_is_rejected() {
    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            end_atom(),
            commit_atom(2, 0, AtomId::START),
            commit_atom(1, 0, AtomId::START),
        ],
    );
    assert_eq!(
        weave.validate(),
        Err(ValidationError::IncorrectUnparentedAtomOrder(AtomId::new(
            1, 0
        )))
    );
}

#[test]
fn duplicate_atoms_read_as_corruption() {
    let weave = Weave::from_serialized(1, vec![start_atom(), end_atom(), end_atom()]);
    assert_eq!(weave.validate(), Err(ValidationError::LikelyCorruption));
}

#[test]
fn gapped_yarn_reads_as_corruption() {
    let weave = Weave::from_serialized(
        1,
        vec![
            start_atom(),
            atom(1, 4, Some(AtomId::START), AtomType::Value),
            end_atom(),
        ],
    );
    assert_eq!(weave.validate(), Err(ValidationError::LikelyCorruption));
}
