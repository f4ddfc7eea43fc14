//! Type conversion and introspection builtins (`typeof`, `tostr`,
//! `toliteral`, `toint`, `tofloat`, `toobj`), grounded on rdaum-moor's
//! `bf_values.rs`.

use super::registry::{BfOutcome, BuiltinDescriptor, BuiltinRegistry};
use crate::objstore::ObjectStore;
use crate::value::{convert, Var};
use crate::vm::interpreter::Vm;

pub fn register(reg: &mut BuiltinRegistry) {
    reg.register(BuiltinDescriptor {
        name: "typeof",
        min_args: 1,
        max_args: Some(1),
        func: bf_typeof,
    });
    reg.register(BuiltinDescriptor {
        name: "tostr",
        min_args: 0,
        max_args: None,
        func: bf_tostr,
    });
    reg.register(BuiltinDescriptor {
        name: "toliteral",
        min_args: 1,
        max_args: Some(1),
        func: bf_toliteral,
    });
    reg.register(BuiltinDescriptor {
        name: "toint",
        min_args: 1,
        max_args: Some(1),
        func: bf_toint,
    });
    reg.register(BuiltinDescriptor {
        name: "tofloat",
        min_args: 1,
        max_args: Some(1),
        func: bf_tofloat,
    });
    reg.register(BuiltinDescriptor {
        name: "toobj",
        min_args: 1,
        max_args: Some(1),
        func: bf_toobj,
    });
    reg.register(BuiltinDescriptor {
        name: "length",
        min_args: 1,
        max_args: Some(1),
        func: bf_length,
    });
    reg.register(BuiltinDescriptor {
        name: "raise",
        min_args: 1,
        max_args: Some(3),
        func: bf_raise,
    });
}

fn bf_typeof(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(convert::typeof_tag(&args[0]))
}

fn bf_tostr(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let mut out = Vec::new();
    for a in &args {
        if let Var::Str(s) = convert::tostr(a) {
            out.extend_from_slice(&s);
        }
    }
    BfOutcome::Value(Var::str(out))
}

fn bf_toliteral(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(convert::toliteral(&args[0]))
}

fn bf_toint(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(Var::Int(convert::toint(&args[0])))
}

fn bf_tofloat(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(Var::Float(convert::tofloat(&args[0])))
}

fn bf_toobj(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(Var::Obj(convert::toobj(&args[0])))
}

fn bf_length(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    match args[0].moo_length() {
        Some(n) => BfOutcome::Value(Var::Int(n as i64)),
        None => BfOutcome::Error(crate::value::ErrorCode::Type),
    }
}

fn bf_raise(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let Var::Err(code) = args[0] else {
        return BfOutcome::Error(crate::value::ErrorCode::Type);
    };
    BfOutcome::Error(code)
}
