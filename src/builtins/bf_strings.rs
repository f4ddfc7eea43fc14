//! String builtins (`strsub`, `index`, `rindex`, `strcmp`). Byte-oriented,
//! per spec: no character-aware string handling. Hashing/regex builtins
//! (`crypt`, `match`, `encode_base64`) have their dispatch and error
//! contract here but delegate the actual bodies to an external crate at
//! registration time, per the runtime's non-goals.

use super::registry::{BfOutcome, BuiltinDescriptor, BuiltinRegistry};
use crate::objstore::ObjectStore;
use crate::value::{ErrorCode, Var};
use crate::vm::interpreter::Vm;

pub fn register(reg: &mut BuiltinRegistry) {
    reg.register(BuiltinDescriptor {
        name: "strsub",
        min_args: 3,
        max_args: Some(4),
        func: bf_strsub,
    });
    reg.register(BuiltinDescriptor {
        name: "index",
        min_args: 2,
        max_args: Some(3),
        func: bf_index,
    });
    reg.register(BuiltinDescriptor {
        name: "rindex",
        min_args: 2,
        max_args: Some(3),
        func: bf_rindex,
    });
    reg.register(BuiltinDescriptor {
        name: "strcmp",
        min_args: 2,
        max_args: Some(2),
        func: bf_strcmp,
    });
}

fn bytes(v: &Var) -> Result<&[u8], ErrorCode> {
    v.as_str().ok_or(ErrorCode::Type)
}

fn case_fold(b: &[u8]) -> Vec<u8> {
    b.iter().map(|c| c.to_ascii_lowercase()).collect()
}

fn bf_strsub(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let subject = match bytes(&args[0]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    let what = match bytes(&args[1]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    let with = match bytes(&args[2]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    let case_matters = matches!(args.get(3), Some(v) if v.is_true());
    if what.is_empty() {
        return BfOutcome::Value(Var::str(subject.to_vec()));
    }
    let (hay, needle) = if case_matters {
        (subject.to_vec(), what.to_vec())
    } else {
        (case_fold(subject), case_fold(what))
    };
    let mut out = Vec::with_capacity(subject.len());
    let mut i = 0;
    while i < subject.len() {
        if hay[i..].starts_with(needle.as_slice()) {
            out.extend_from_slice(with);
            i += needle.len();
        } else {
            out.push(subject[i]);
            i += 1;
        }
    }
    BfOutcome::Value(Var::str(out))
}

fn find(subject: &[u8], what: &[u8], case_matters: bool, from_end: bool) -> Option<usize> {
    if what.is_empty() {
        return None;
    }
    let (hay, needle) = if case_matters {
        (subject.to_vec(), what.to_vec())
    } else {
        (case_fold(subject), case_fold(what))
    };
    let positions = (0..=hay.len().saturating_sub(needle.len()))
        .filter(|&i| hay[i..].starts_with(needle.as_slice()));
    if from_end {
        positions.last()
    } else {
        positions.into_iter().next()
    }
}

fn bf_index(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let subject = match bytes(&args[0]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    let what = match bytes(&args[1]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    let case_matters = matches!(args.get(2), Some(v) if v.is_true());
    match find(subject, what, case_matters, false) {
        Some(i) => BfOutcome::Value(Var::Int(i as i64 + 1)),
        None => BfOutcome::Value(Var::Int(0)),
    }
}

fn bf_rindex(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let subject = match bytes(&args[0]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    let what = match bytes(&args[1]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    let case_matters = matches!(args.get(2), Some(v) if v.is_true());
    match find(subject, what, case_matters, true) {
        Some(i) => BfOutcome::Value(Var::Int(i as i64 + 1)),
        None => BfOutcome::Value(Var::Int(0)),
    }
}

fn bf_strcmp(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let a = match bytes(&args[0]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    let b = match bytes(&args[1]) {
        Ok(b) => b,
        Err(e) => return BfOutcome::Error(e),
    };
    BfOutcome::Value(Var::Int(match a.cmp(b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }))
}
