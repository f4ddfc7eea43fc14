//! Database round-trip coverage from spec §8: writing a textdump and
//! reading it back reproduces the object graph structurally (property 9),
//! and a database whose only anonymous-object batch is empty still reads
//! back cleanly through the zero-count terminator (property 10).

use moor_core::objstore::object::PropPerms;
use moor_core::objstore::ObjectStore;
use moor_core::scheduler::Scheduler;
use moor_core::textdump::{read_textdump, write_textdump, DbVersion};
use moor_core::value::{ObjId, Var};

fn root_object_with_props() -> ObjectStore {
    let mut store = ObjectStore::new();
    let root = store
        .create(vec![], ObjId::NOTHING, "Root Class", false)
        .unwrap();
    store
        .define_property(root, "count", root, PropPerms::READ | PropPerms::WRITE, Var::Int(42))
        .unwrap();
    store
        .define_property(
            root,
            "names",
            root,
            PropPerms::READ | PropPerms::WRITE,
            Var::list(vec![Var::str(b"alice".to_vec()), Var::str(b"bob".to_vec())]),
        )
        .unwrap();
    let child = store.create(vec![root], root, "Child", false).unwrap();
    // Leave the child's "count" as an inherited Clear slot to exercise the
    // propdef/propval split across the round trip.
    let _ = child;
    store
}

#[test]
fn textdump_round_trip_preserves_object_graph_structurally() {
    let store = root_object_with_props();
    let scheduler = Scheduler::new();
    let bytes = write_textdump(DbVersion::V17, &store, &scheduler);

    let loaded = read_textdump(&bytes).expect("round-tripped dump parses");
    assert_eq!(loaded.version, DbVersion::V17);

    let root = ObjId(0);
    let child = ObjId(1);
    assert!(loaded.store.valid(root));
    assert!(loaded.store.valid(child));

    let (definer, count) = loaded.store.resolve_property(root, "count").unwrap();
    assert_eq!(definer, root);
    assert!(count.eq_moo(&Var::Int(42)));

    let (_, names) = loaded.store.resolve_property(root, "names").unwrap();
    assert!(names.eq_moo(&Var::list(vec![
        Var::str(b"alice".to_vec()),
        Var::str(b"bob".to_vec())
    ])));

    // The child never set its own "count"; it must still resolve through
    // inheritance to the same value as the parent (Clear-slot semantics
    // survive the round trip).
    let (child_definer, child_count) = loaded.store.resolve_property(child, "count").unwrap();
    assert_eq!(child_definer, root);
    assert!(child_count.eq_moo(&Var::Int(42)));
}

#[test]
fn empty_anonymous_object_section_reads_back_as_zero_count_batch_loop() {
    // No anonymous objects exist here at all, so the writer emits a single
    // `0` and stops; the reader's batch loop must terminate on that first
    // zero without attempting to read a batch of objects after it.
    let store = root_object_with_root_only();
    let scheduler = Scheduler::new();
    let bytes = write_textdump(DbVersion::V17, &store, &scheduler);

    let loaded = read_textdump(&bytes).expect("dump with no anonymous objects parses");
    assert_eq!(loaded.store.iter_live().count(), 1);
}

fn root_object_with_root_only() -> ObjectStore {
    let mut store = ObjectStore::new();
    store.create(vec![], ObjId::NOTHING, "Root", false).unwrap();
    store
}
