//! Short-circuit evaluation for `&&`/`||`/the ternary operator (spec §8
//! property 7): the untaken branch must never execute, observed here via
//! its `notify()` side effect never firing.

use moor_core::builtins::BuiltinRegistry;
use moor_core::compiler::compile_verb;
use moor_core::objstore::object::{ArgSpec, PrepSpec, VerbArgSpec, VerbPerms, VerbSlot};
use moor_core::objstore::ObjectStore;
use moor_core::scheduler::{Scheduler, ServerOptions, TaskOutcome};
use moor_core::value::{ObjId, Var};

fn new_store_with_root() -> (ObjectStore, ObjId) {
    let mut store = ObjectStore::new();
    let root = store.create(vec![], ObjId::NOTHING, "root", false).unwrap();
    (store, root)
}

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

fn run_verb(store: &mut ObjectStore, root: ObjId, source: &str) -> (Option<Var>, Vec<String>) {
    add_verb(store, root, "go", source);
    let builtins = BuiltinRegistry::new();
    let opts = ServerOptions::read(store);
    let mut scheduler = Scheduler::new();
    scheduler
        .enqueue_verb_call(store, &opts, root, root, root, "go", vec![])
        .unwrap();

    let mut result = None;
    let mut notified = Vec::new();
    scheduler.drain(store, &builtins, &opts, &mut |outcome| {
        if let TaskOutcome::Complete { result: v, notifications, .. } = outcome {
            result = Some(v);
            for (_, text) in notifications {
                notified.push(String::from_utf8_lossy(&text).into_owned());
            }
        }
    });
    (result, notified)
}

#[test]
fn or_short_circuits_and_never_evaluates_the_right_side_when_left_is_true() {
    let (mut store, root) = new_store_with_root();
    let (result, notified) = run_verb(
        &mut store,
        root,
        "return 1 || notify(player, \"evaluated\");",
    );
    // `||` returns whichever operand decided the result, not a bare
    // boolean — the truthy left side short-circuits and is returned as-is.
    assert!(result.unwrap().eq_moo(&Var::Int(1)));
    assert!(notified.is_empty(), "right side of || must not run");
}

#[test]
fn and_short_circuits_and_never_evaluates_the_right_side_when_left_is_false() {
    let (mut store, root) = new_store_with_root();
    let (result, notified) = run_verb(
        &mut store,
        root,
        "return 0 && notify(player, \"evaluated\");",
    );
    // Likewise `&&` returns the falsy left side itself, not `Bool(false)`.
    assert!(result.unwrap().eq_moo(&Var::Int(0)));
    assert!(notified.is_empty(), "right side of && must not run");
}

#[test]
fn ternary_never_evaluates_the_untaken_branch() {
    let (mut store, root) = new_store_with_root();
    let (result, notified) = run_verb(
        &mut store,
        root,
        "return 1 ? 10 : notify(player, \"evaluated\");",
    );
    assert!(result.unwrap().eq_moo(&Var::Int(10)));
    assert!(notified.is_empty(), "untaken ternary branch must not run");
}
