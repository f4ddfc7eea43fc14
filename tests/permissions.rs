//! Permission-gate and stack-depth coverage added alongside the follow-up
//! hardening pass recorded in `DESIGN.md` §"Follow-up hardening pass":
//! `E_PERM` on a property write lacking the `w` bit from a non-owner,
//! non-wizard caller; virtual built-in property reads going through the
//! object record rather than the property map; and `E_MAXREC` on exceeding
//! `max_stack_depth` (spec §4.4, §4.5, §7).

use moor_core::builtins::BuiltinRegistry;
use moor_core::compiler::compile_verb;
use moor_core::objstore::object::{ArgSpec, PrepSpec, PropPerms, VerbArgSpec, VerbPerms, VerbSlot};
use moor_core::objstore::ObjectStore;
use moor_core::scheduler::{Scheduler, ServerOptions, TaskOutcome};
use moor_core::value::{ObjId, Var};

fn add_verb(store: &mut ObjectStore, obj: ObjId, name: &str, source: &str) {
    let lines: Vec<String> = source.lines().map(|s| s.to_string()).collect();
    let program = compile_verb(&lines).expect("verb compiles");
    let verb = VerbSlot {
        names: vec![name.to_string()],
        owner: obj,
        perms: VerbPerms::all(),
        argspec: VerbArgSpec {
            dobj: ArgSpec::None,
            prep: PrepSpec::None,
            iobj: ArgSpec::None,
        },
        source: lines,
        program: Some(program),
    };
    store.add_verb(obj, verb).unwrap();
}

fn run_to_quiescence(
    store: &mut ObjectStore,
    scheduler: &mut Scheduler,
    builtins: &BuiltinRegistry,
    opts: &ServerOptions,
) -> Vec<TaskOutcome> {
    let mut outcomes = Vec::new();
    scheduler.drain(store, builtins, opts, &mut |o| outcomes.push(o));
    outcomes
}

#[test]
fn property_write_without_owner_wizard_or_w_bit_raises_e_perm() {
    let mut store = ObjectStore::new();
    let root = store.create(vec![], ObjId::NOTHING, "root", false).unwrap();
    let intruder = store.create(vec![], ObjId::NOTHING, "intruder", false).unwrap();
    store
        .define_property(root, "secret", root, PropPerms::READ, Var::Int(1))
        .unwrap();
    add_verb(&mut store, root, "go", "this.secret = 99; return 1;");

    let opts = ServerOptions::read(&store);
    let mut scheduler = Scheduler::new();
    // Top-level task runs with `permissions = intruder`, not the property's
    // owner, and `intruder` carries no WIZARD flag.
    scheduler
        .enqueue_verb_call(&store, &opts, root, intruder, intruder, "go", vec![])
        .unwrap();

    let outcomes = run_to_quiescence(&mut store, &mut scheduler, &BuiltinRegistry::new(), &opts);
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        TaskOutcome::Aborted { traceback, .. } => {
            assert!(traceback.contains("Perm"), "expected E_PERM, got {traceback}");
        }
        other => panic!("expected Aborted on E_PERM, got {other:?}"),
    }
    // The store itself must show the write never took effect.
    assert!(store
        .resolve_property(root, "secret")
        .unwrap()
        .1
        .eq_moo(&Var::Int(1)));
}

#[test]
fn owner_can_write_a_read_only_property() {
    let mut store = ObjectStore::new();
    let root = store.create(vec![], ObjId::NOTHING, "root", false).unwrap();
    store
        .define_property(root, "secret", root, PropPerms::READ, Var::Int(1))
        .unwrap();
    add_verb(&mut store, root, "go", "this.secret = 99; return this.secret;");

    let opts = ServerOptions::read(&store);
    let mut scheduler = Scheduler::new();
    scheduler
        .enqueue_verb_call(&store, &opts, root, root, root, "go", vec![])
        .unwrap();

    let outcomes = run_to_quiescence(&mut store, &mut scheduler, &BuiltinRegistry::new(), &opts);
    match &outcomes[0] {
        TaskOutcome::Complete { result, .. } => assert!(result.eq_moo(&Var::Int(99))),
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[test]
fn virtual_builtin_properties_read_off_the_object_record() {
    let mut store = ObjectStore::new();
    let root = store.create(vec![], ObjId::NOTHING, "Root Object", false).unwrap();
    add_verb(&mut store, root, "go", "return this.name;");

    let opts = ServerOptions::read(&store);
    let mut scheduler = Scheduler::new();
    scheduler
        .enqueue_verb_call(&store, &opts, root, root, root, "go", vec![])
        .unwrap();

    let outcomes = run_to_quiescence(&mut store, &mut scheduler, &BuiltinRegistry::new(), &opts);
    match &outcomes[0] {
        TaskOutcome::Complete { result, .. } => {
            assert!(result.eq_moo(&Var::str(b"Root Object".to_vec())));
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[test]
fn move_invokes_exitfunc_and_enterfunc_as_subtasks() {
    let mut store = ObjectStore::new();
    let root = store.create(vec![], ObjId::NOTHING, "root", false).unwrap();
    let old_loc = store.create(vec![], ObjId::NOTHING, "old room", false).unwrap();
    let new_loc = store.create(vec![], ObjId::NOTHING, "new room", false).unwrap();
    let thing = store.create(vec![], ObjId::NOTHING, "thing", false).unwrap();
    store.move_object(thing, old_loc).unwrap();

    add_verb(&mut store, old_loc, "exitfunc", "notify(player, \"left old room\");");
    add_verb(&mut store, new_loc, "enterfunc", "notify(player, \"entered new room\");");
    add_verb(
        &mut store,
        root,
        "go",
        &format!("move(#{}, #{}); return 1;", thing.0, new_loc.0),
    );

    let opts = ServerOptions::read(&store);
    let mut scheduler = Scheduler::new();
    scheduler
        .enqueue_verb_call(&store, &opts, root, root, root, "go", vec![])
        .unwrap();

    let outcomes = run_to_quiescence(&mut store, &mut scheduler, &BuiltinRegistry::new(), &opts);
    let texts: Vec<String> = outcomes
        .iter()
        .flat_map(|o| match o {
            TaskOutcome::Complete { notifications, .. } => notifications.clone(),
            TaskOutcome::Aborted { notifications, .. } => notifications.clone(),
            TaskOutcome::StillRunning => Vec::new(),
        })
        .map(|(_, text)| String::from_utf8_lossy(&text).into_owned())
        .collect();
    assert!(texts.iter().any(|t| t == "left old room"), "got {texts:?}");
    assert!(texts.iter().any(|t| t == "entered new room"), "got {texts:?}");
    assert_eq!(store.get(thing).unwrap().location, new_loc);
}

#[test]
fn exceeding_max_stack_depth_raises_e_maxrec() {
    let mut store = ObjectStore::new();
    let root = store.create(vec![], ObjId::NOTHING, "root", false).unwrap();
    add_verb(&mut store, root, "recurse", "this:recurse(); return 1;");

    let mut opts = ServerOptions::read(&store);
    opts.max_stack_depth = 5;
    let mut scheduler = Scheduler::new();
    scheduler
        .enqueue_verb_call(&store, &opts, root, root, root, "recurse", vec![])
        .unwrap();

    let outcomes = run_to_quiescence(&mut store, &mut scheduler, &BuiltinRegistry::new(), &opts);
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        TaskOutcome::Aborted { traceback, .. } => {
            assert!(traceback.contains("MaxRec"), "expected E_MAXREC, got {traceback}");
        }
        other => panic!("expected Aborted on E_MAXREC, got {other:?}"),
    }
}
