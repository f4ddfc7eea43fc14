//! Object graph builtins (`create`, `valid`, `parent`, `children`,
//! `chparent`, `move`, `recycle`), grounded on rdaum-moor's `bf_objects.rs`
//! and [`crate::objstore::store`]'s `ObjectStore` API.

use super::registry::{BfOutcome, BuiltinDescriptor, BuiltinRegistry};
use crate::objstore::ObjectStore;
use crate::value::{ErrorCode, ObjId, Var};
use crate::vm::activation::Activation;
use crate::vm::interpreter::{ForkRequest, Vm};
use std::sync::Arc;
use std::time::Duration;

pub fn register(reg: &mut BuiltinRegistry) {
    reg.register(BuiltinDescriptor {
        name: "create",
        min_args: 1,
        max_args: Some(2),
        func: bf_create,
    });
    reg.register(BuiltinDescriptor {
        name: "valid",
        min_args: 1,
        max_args: Some(1),
        func: bf_valid,
    });
    reg.register(BuiltinDescriptor {
        name: "parent",
        min_args: 1,
        max_args: Some(1),
        func: bf_parent,
    });
    reg.register(BuiltinDescriptor {
        name: "children",
        min_args: 1,
        max_args: Some(1),
        func: bf_children,
    });
    reg.register(BuiltinDescriptor {
        name: "chparent",
        min_args: 2,
        max_args: Some(2),
        func: bf_chparent,
    });
    reg.register(BuiltinDescriptor {
        name: "move",
        min_args: 2,
        max_args: Some(2),
        func: bf_move,
    });
    reg.register(BuiltinDescriptor {
        name: "recycle",
        min_args: 1,
        max_args: Some(1),
        func: bf_recycle,
    });
    reg.register(BuiltinDescriptor {
        name: "max_object",
        min_args: 0,
        max_args: Some(0),
        func: bf_max_object,
    });
}

fn as_obj(v: &Var) -> Result<ObjId, ErrorCode> {
    v.as_obj().ok_or(ErrorCode::Type)
}

fn bf_create(args: Vec<Var>, vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let parent = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let owner = vm.stack.last().map(|a| a.permissions).unwrap_or(ObjId::SYSTEM);
    let parents = if parent == ObjId::NOTHING { vec![] } else { vec![parent] };
    match store.create(parents, owner, "", false) {
        Ok(id) => BfOutcome::Value(Var::Obj(id)),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_valid(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    match as_obj(&args[0]) {
        Ok(o) => BfOutcome::Value(Var::Bool(store.valid(o))),
        Err(e) => BfOutcome::Error(e),
    }
}

fn bf_parent(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    match store.get(o) {
        Ok(obj) => BfOutcome::Value(Var::Obj(obj.parents.first().copied().unwrap_or(ObjId::NOTHING))),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_children(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    match store.get(o) {
        Ok(obj) => BfOutcome::Value(Var::list(obj.children.iter().map(|c| Var::Obj(*c)).collect())),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_chparent(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let p = match as_obj(&args[1]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let parents = if p == ObjId::NOTHING { vec![] } else { vec![p] };
    match store.chparent(o, parents) {
        Ok(()) => BfOutcome::Value(Var::None),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_move(args: Vec<Var>, vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let what = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let whither = match as_obj(&args[1]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let player = vm.stack.last().map(|a| a.player).unwrap_or(ObjId::SYSTEM);
    match store.move_object(what, whither) {
        Ok(old_location) => {
            if old_location != ObjId::NOTHING {
                enqueue_hook_call(vm, store, old_location, "exitfunc", vec![Var::Obj(what)], player);
            }
            if whither != ObjId::NOTHING {
                enqueue_hook_call(vm, store, whither, "enterfunc", vec![Var::Obj(what)], player);
            }
            BfOutcome::Value(Var::None)
        }
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

/// Queues `exitfunc`/`enterfunc` as background subtasks, the same
/// `ForkRequest` mechanism the `Fork` opcode uses (spec §4.2).
fn enqueue_hook_call(
    vm: &mut Vm,
    store: &ObjectStore,
    receiver: ObjId,
    verb_name: &str,
    args: Vec<Var>,
    player: ObjId,
) {
    let Ok((owner, _idx, verb)) = store.resolve_verb(receiver, verb_name) else {
        return;
    };
    let Some(program) = verb.program.clone() else {
        return;
    };
    let act = Activation::new(
        Arc::new(program),
        receiver,
        player,
        ObjId::NOTHING,
        owner,
        verb_name.to_string(),
        owner,
        args,
    );
    vm.pending_forks.push(ForkRequest { delay: Duration::ZERO, activation: act });
}

fn bf_recycle(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    match store.recycle(o) {
        Ok(()) => BfOutcome::Value(Var::None),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_max_object(_args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(Var::Obj(store.max_object()))
}
