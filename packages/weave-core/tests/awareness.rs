use weave_core::{AtomId, Weave};

#[test]
fn awareness_covers_the_causal_past() {
    let mut weave: Weave<u8> = Weave::new(1);
    let a = weave.add_atom(b'a', AtomId::START, 1).unwrap();
    let b = weave.add_atom(b'b', a, 2).unwrap();

    let aweft = weave.awareness_weft(b).unwrap();
    assert!(aweft.includes_id(b));
    assert!(aweft.includes_id(a));
    assert!(aweft.includes_id(AtomId::START));
    // The end atom is not in b's causal past.
    assert!(!aweft.includes_id(AtomId::END));
}

#[test]
fn awareness_crosses_sites_through_causes() {
    let base = {
        let mut weave: Weave<u8> = Weave::new(1);
        weave.add_atom(b'a', AtomId::START, 1).unwrap();
        weave
    };
    let mut other: Weave<u8> = Weave::new(2);
    other.integrate(&base).unwrap();
    let child = other.add_atom(b'b', AtomId::new(1, 0), 2).unwrap();

    let aweft = other.awareness_weft(child).unwrap();
    assert_eq!(aweft.get(0), Some(0));
    assert_eq!(aweft.get(1), Some(0));
    assert_eq!(aweft.get(2), Some(child.index));
}

#[test]
fn awareness_crosses_sites_through_commit_references() {
    // A commit to another site pulls that site's whole yarn (and its causal
    // past) into the awareness of every later atom on the committing yarn.
    let mut writer: Weave<u8> = Weave::new(1);
    let a = writer.add_atom(b'a', AtomId::START, 1).unwrap();
    writer.add_atom(b'b', a, 2).unwrap();

    let mut reader: Weave<u8> = Weave::new(2);
    reader.integrate(&writer).unwrap();
    let sibling = reader.add_atom(b'c', AtomId::START, 3).unwrap();

    let aweft = reader.awareness_weft(sibling).unwrap();
    assert_eq!(aweft.get(1), Some(1));
    // The commit itself is on the reader's own yarn, below the new atom.
    assert!(aweft.includes_id(AtomId::new(2, 0)));
}

#[test]
fn commit_atoms_are_aware_of_their_reference() {
    let mut remote: Weave<u8> = Weave::new(2);
    remote.add_atom(b'x', AtomId::START, 1).unwrap();

    let mut local: Weave<u8> = Weave::new(1);
    local.integrate(&remote).unwrap();
    let commit = local.add_commit(1, 2, 5).unwrap();

    let aweft = local.awareness_weft(commit).unwrap();
    assert!(aweft.includes_id(AtomId::new(2, 0)));
    assert!(aweft.includes_id(commit));
}

#[test]
fn awareness_rejects_unknown_atoms() {
    let weave: Weave<u8> = Weave::new(1);
    assert!(weave.awareness_weft(AtomId::new(1, 0)).is_none());
    assert!(weave.awareness_weft(AtomId::new(0, 2)).is_none());
}

#[test]
fn causal_block_spans_the_subtree() {
    let mut weave: Weave<u8> = Weave::new(1);
    let a = weave.add_atom(b'a', AtomId::START, 1).unwrap();
    let b = weave.add_atom(b'b', a, 2).unwrap();
    weave.add_atom(b'c', b, 3).unwrap();
    weave.add_atom(b'd', AtomId::START, 4).unwrap();

    // weave: [start, d, a, b, c, end]
    let d_index = weave.atom_weave_index(AtomId::new(1, 3)).unwrap();
    assert_eq!(weave.causal_block(d_index), Some(1..2));

    let a_index = weave.atom_weave_index(a).unwrap();
    assert_eq!(weave.causal_block(a_index), Some(2..5));

    let b_index = weave.atom_weave_index(b).unwrap();
    assert_eq!(weave.causal_block(b_index), Some(3..5));

    // The whole tree section hangs off the start atom.
    assert_eq!(weave.causal_block(0), Some(0..5));
}

#[test]
fn causal_block_excludes_a_following_sibling() {
    // 'd' is aware of its sibling 'a', but 'a' is no part of d's subtree.
    let mut weave: Weave<u8> = Weave::new(1);
    let a = weave.add_atom(b'a', AtomId::START, 1).unwrap();
    weave.add_atom(b'b', a, 2).unwrap();
    weave.add_atom(b'd', AtomId::START, 3).unwrap();

    // weave: [start, d, a, b, end]
    let d_index = weave.atom_weave_index(AtomId::new(1, 2)).unwrap();
    assert_eq!(weave.causal_block(d_index), Some(1..2));
}

#[test]
fn tombstones_and_unparented_atoms_have_trivial_blocks() {
    let mut remote: Weave<u8> = Weave::new(2);
    remote.add_atom(b'x', AtomId::START, 1).unwrap();

    let mut weave: Weave<u8> = Weave::new(1);
    weave.integrate(&remote).unwrap();
    let target = AtomId::new(2, 0);
    weave.delete_atom(target, 2).unwrap();
    weave.add_commit(1, 2, 3).unwrap();

    // weave: [start, x, del, end, commit]
    let del_index = weave.atom_weave_index(AtomId::new(1, 0)).unwrap();
    assert_eq!(weave.causal_block(del_index), Some(del_index..del_index + 1));

    let end_index = weave.atom_weave_index(AtomId::END).unwrap();
    assert_eq!(weave.causal_block(end_index), None);
    let commit_index = weave.atom_weave_index(AtomId::new(1, 1)).unwrap();
    assert_eq!(weave.causal_block(commit_index), None);
    assert_eq!(weave.causal_block(99), None);
}
