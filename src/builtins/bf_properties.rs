//! Property definition/introspection builtins (`properties`, `add_property`,
//! `delete_property`, `is_clear_property`, `clear_property`), grounded on
//! [`crate::objstore::store`]'s property API.

use super::registry::{BfOutcome, BuiltinDescriptor, BuiltinRegistry};
use crate::objstore::{ObjectStore, PropPerms, PropSlotValue};
use crate::value::{ErrorCode, ObjId, Var};
use crate::vm::interpreter::Vm;

pub fn register(reg: &mut BuiltinRegistry) {
    reg.register(BuiltinDescriptor {
        name: "properties",
        min_args: 1,
        max_args: Some(1),
        func: bf_properties,
    });
    reg.register(BuiltinDescriptor {
        name: "add_property",
        min_args: 4,
        max_args: Some(4),
        func: bf_add_property,
    });
    reg.register(BuiltinDescriptor {
        name: "delete_property",
        min_args: 2,
        max_args: Some(2),
        func: bf_delete_property,
    });
    reg.register(BuiltinDescriptor {
        name: "is_clear_property",
        min_args: 2,
        max_args: Some(2),
        func: bf_is_clear_property,
    });
    reg.register(BuiltinDescriptor {
        name: "clear_property",
        min_args: 2,
        max_args: Some(2),
        func: bf_clear_property,
    });
}

fn as_obj(v: &Var) -> Result<ObjId, ErrorCode> {
    v.as_obj().ok_or(ErrorCode::Type)
}

fn as_name(v: &Var) -> Result<String, ErrorCode> {
    v.as_str()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .ok_or(ErrorCode::Type)
}

fn bf_properties(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    match store.get(o) {
        Ok(obj) => BfOutcome::Value(Var::list(
            obj.properties
                .iter()
                .map(|p| Var::str(p.name.as_bytes().to_vec()))
                .collect(),
        )),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_add_property(args: Vec<Var>, vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let name = match as_name(&args[1]) {
        Ok(n) => n,
        Err(e) => return BfOutcome::Error(e),
    };
    let initial = args[2].clone();
    let owner = vm.stack.last().map(|a| a.permissions).unwrap_or(o);
    let perms = PropPerms::READ | PropPerms::WRITE;
    match store.define_property(o, &name, owner, perms, initial) {
        Ok(()) => BfOutcome::Value(Var::None),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_delete_property(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let name = match as_name(&args[1]) {
        Ok(n) => n,
        Err(e) => return BfOutcome::Error(e),
    };
    match store.delete_property(o, &name) {
        Ok(()) => BfOutcome::Value(Var::None),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_is_clear_property(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let name = match as_name(&args[1]) {
        Ok(n) => n,
        Err(e) => return BfOutcome::Error(e),
    };
    let obj = match store.get(o) {
        Ok(obj) => obj,
        Err(e) => return BfOutcome::Error(super::store_err_to_code(e)),
    };
    match obj.find_own_property(&name) {
        Some(idx) => BfOutcome::Value(Var::Bool(matches!(
            obj.properties[idx].value,
            PropSlotValue::Clear
        ))),
        None => BfOutcome::Error(ErrorCode::PropNF),
    }
}

fn bf_clear_property(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let o = match as_obj(&args[0]) {
        Ok(o) => o,
        Err(e) => return BfOutcome::Error(e),
    };
    let name = match as_name(&args[1]) {
        Ok(n) => n,
        Err(e) => return BfOutcome::Error(e),
    };
    match store.clear_property(o, &name) {
        Ok(()) => BfOutcome::Value(Var::None),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}
