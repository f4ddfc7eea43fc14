//! List/map builtins (`listappend`, `listinsert`, `listdelete`, `setadd`,
//! `setremove`, `mapkeys`, `mapvalues`, `equal`), thin wrappers over
//! [`crate::value::arith`]'s aggregate-mutation helpers.

use super::registry::{BfOutcome, BuiltinDescriptor, BuiltinRegistry};
use crate::objstore::ObjectStore;
use crate::value::{arith, ErrorCode, Var};
use crate::vm::interpreter::Vm;

pub fn register(reg: &mut BuiltinRegistry) {
    reg.register(BuiltinDescriptor {
        name: "listappend",
        min_args: 2,
        max_args: Some(3),
        func: bf_listappend,
    });
    reg.register(BuiltinDescriptor {
        name: "listinsert",
        min_args: 2,
        max_args: Some(3),
        func: bf_listinsert,
    });
    reg.register(BuiltinDescriptor {
        name: "listdelete",
        min_args: 2,
        max_args: Some(2),
        func: bf_listdelete,
    });
    reg.register(BuiltinDescriptor {
        name: "setadd",
        min_args: 2,
        max_args: Some(2),
        func: bf_setadd,
    });
    reg.register(BuiltinDescriptor {
        name: "setremove",
        min_args: 2,
        max_args: Some(2),
        func: bf_setremove,
    });
    reg.register(BuiltinDescriptor {
        name: "mapkeys",
        min_args: 1,
        max_args: Some(1),
        func: bf_mapkeys,
    });
    reg.register(BuiltinDescriptor {
        name: "mapvalues",
        min_args: 1,
        max_args: Some(1),
        func: bf_mapvalues,
    });
    reg.register(BuiltinDescriptor {
        name: "equal",
        min_args: 2,
        max_args: Some(2),
        func: bf_equal,
    });
}

fn bf_listappend(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let mut list = args[0].clone();
    let after = match args.get(2) {
        Some(Var::Int(i)) => Some(*i),
        Some(_) => return BfOutcome::Error(ErrorCode::Type),
        None => None,
    };
    match arith::list_append(&mut list, args[1].clone(), after) {
        Ok(()) => BfOutcome::Value(list),
        Err(e) => BfOutcome::Error(e),
    }
}

fn bf_listinsert(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let mut list = args[0].clone();
    let index = match args.get(2) {
        Some(Var::Int(i)) => *i,
        Some(_) => return BfOutcome::Error(ErrorCode::Type),
        None => 1,
    };
    match arith::list_insert(&mut list, index, args[1].clone()) {
        Ok(()) => BfOutcome::Value(list),
        Err(e) => BfOutcome::Error(e),
    }
}

fn bf_listdelete(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let mut list = args[0].clone();
    let Some(index) = args[1].as_int() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    match arith::list_delete(&mut list, index) {
        Ok(()) => BfOutcome::Value(list),
        Err(e) => BfOutcome::Error(e),
    }
}

fn bf_setadd(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    match arith::in_list(&args[1], &args[0]) {
        Ok(Var::Int(0)) => {
            let mut list = args[0].clone();
            match arith::list_append(&mut list, args[1].clone(), None) {
                Ok(()) => BfOutcome::Value(list),
                Err(e) => BfOutcome::Error(e),
            }
        }
        Ok(_) => BfOutcome::Value(args[0].clone()),
        Err(e) => BfOutcome::Error(e),
    }
}

fn bf_setremove(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    match arith::in_list(&args[1], &args[0]) {
        Ok(Var::Int(0)) => BfOutcome::Value(args[0].clone()),
        Ok(Var::Int(pos)) => {
            let mut list = args[0].clone();
            match arith::list_delete(&mut list, pos) {
                Ok(()) => BfOutcome::Value(list),
                Err(e) => BfOutcome::Error(e),
            }
        }
        Ok(_) => unreachable!(),
        Err(e) => BfOutcome::Error(e),
    }
}

fn bf_mapkeys(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let Var::Map(m) = &args[0] else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    BfOutcome::Value(Var::list(m.keys().map(|k| k.to_var()).collect()))
}

fn bf_mapvalues(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let Var::Map(m) = &args[0] else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    BfOutcome::Value(Var::list(m.values().cloned().collect()))
}

fn bf_equal(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(Var::Bool(args[0].eq_moo(&args[1])))
}
