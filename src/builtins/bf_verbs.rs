//! Verb definition/introspection builtins (`add_verb`, `verb_code`,
//! `set_verb_code`, `verb_info`), grounded on rdaum-moor's `bf_verbs.rs`.

use super::registry::{BfOutcome, BuiltinDescriptor, BuiltinRegistry};
use crate::objstore::{ArgSpec, ObjectStore, PrepSpec, VerbArgSpec, VerbPerms, VerbSlot};
use crate::value::{ErrorCode, Var};
use crate::vm::interpreter::Vm;

pub fn register(reg: &mut BuiltinRegistry) {
    reg.register(BuiltinDescriptor {
        name: "add_verb",
        min_args: 3,
        max_args: Some(3),
        func: bf_add_verb,
    });
    reg.register(BuiltinDescriptor {
        name: "verb_code",
        min_args: 2,
        max_args: Some(2),
        func: bf_verb_code,
    });
    reg.register(BuiltinDescriptor {
        name: "set_verb_code",
        min_args: 3,
        max_args: Some(3),
        func: bf_set_verb_code,
    });
}

fn bf_add_verb(args: Vec<Var>, vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let Some(obj) = args[0].as_obj() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let Var::List(info) = &args[1] else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let names = match info.first() {
        Some(Var::Str(s)) => String::from_utf8_lossy(s)
            .split_whitespace()
            .map(String::from)
            .collect::<Vec<_>>(),
        _ => return BfOutcome::Error(ErrorCode::Type),
    };
    let Var::List(argspec) = &args[2] else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let argspec = parse_argspec(argspec);
    let owner = vm.stack.last().map(|a| a.permissions).unwrap_or(obj);
    let verb = VerbSlot {
        names,
        owner,
        perms: VerbPerms::READ | VerbPerms::WRITE | VerbPerms::EXEC,
        argspec,
        source: Vec::new(),
        program: None,
    };
    match store.add_verb(obj, verb) {
        Ok(idx) => BfOutcome::Value(Var::Int(idx as i64)),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn parse_argspec(items: &[Var]) -> VerbArgSpec {
    let spec_word = |v: &Var| -> String {
        match v {
            Var::Str(s) => String::from_utf8_lossy(s).to_lowercase(),
            _ => String::new(),
        }
    };
    let dobj = match items.first().map(spec_word).as_deref() {
        Some("this") => ArgSpec::This,
        Some("any") => ArgSpec::Any,
        _ => ArgSpec::None,
    };
    let prep = match items.get(1).map(spec_word) {
        Some(s) if s == "none" => PrepSpec::None,
        Some(s) if s == "any" => PrepSpec::Any,
        Some(s) => PrepSpec::Other(s),
        None => PrepSpec::None,
    };
    let iobj = match items.get(2).map(spec_word).as_deref() {
        Some("this") => ArgSpec::This,
        Some("any") => ArgSpec::Any,
        _ => ArgSpec::None,
    };
    VerbArgSpec { dobj, prep, iobj }
}

fn bf_verb_code(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let Some(obj) = args[0].as_obj() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let Some(name) = args[1].as_str() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let name = String::from_utf8_lossy(name).into_owned();
    match store.resolve_verb(obj, &name) {
        Ok((_, _, verb)) => BfOutcome::Value(Var::list(
            verb.source.iter().map(|l| Var::str(l.as_bytes().to_vec())).collect(),
        )),
        Err(e) => BfOutcome::Error(super::store_err_to_code(e)),
    }
}

fn bf_set_verb_code(args: Vec<Var>, _vm: &mut Vm, store: &mut ObjectStore) -> BfOutcome {
    let Some(obj) = args[0].as_obj() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let Some(name) = args[1].as_str() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let name = String::from_utf8_lossy(name).into_owned();
    let Var::List(lines) = &args[2] else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let source: Vec<String> = lines
        .iter()
        .filter_map(|v| v.as_str().map(|s| String::from_utf8_lossy(s).into_owned()))
        .collect();
    let program = match crate::compiler::compile_verb(&source) {
        Ok(p) => p,
        Err(_) => return BfOutcome::Error(ErrorCode::Invarg),
    };
    let Ok(o) = store.get_mut(obj) else {
        return BfOutcome::Error(ErrorCode::Invind);
    };
    let Some(idx) = o.find_own_verb_by_name(&name) else {
        return BfOutcome::Error(ErrorCode::VerbNF);
    };
    o.verbs[idx].source = source;
    o.verbs[idx].program = Some(program);
    BfOutcome::Value(Var::empty_list())
}
