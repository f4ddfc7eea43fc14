//! Explicit conversions: `toint`, `tofloat`, `tostr`, `toobj`, `toliteral`
//! (spec §4.1). These never raise; a conversion that cannot produce a
//! meaningful value falls back to a type-appropriate zero, matching
//! LambdaMOO's historical behavior.

use std::sync::Arc;

use super::var::{ObjId, Var};

pub fn toint(v: &Var) -> i64 {
    match v {
        Var::Int(i) => *i,
        Var::Float(f) => *f as i64,
        Var::Obj(o) => o.0,
        Var::Str(s) => parse_leading_int(s),
        Var::Bool(b) => *b as i64,
        Var::Err(e) => *e as i64,
        _ => 0,
    }
}

fn parse_leading_int(s: &[u8]) -> i64 {
    let text = String::from_utf8_lossy(s);
    let trimmed = text.trim_start();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    trimmed[..end].parse().unwrap_or(0)
}

pub fn tofloat(v: &Var) -> f64 {
    match v {
        Var::Int(i) => *i as f64,
        Var::Float(f) => *f,
        Var::Str(s) => String::from_utf8_lossy(s).trim().parse().unwrap_or(0.0),
        Var::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

pub fn tostr(v: &Var) -> Var {
    Var::str(format!("{v}").into_bytes())
}

pub fn toobj(v: &Var) -> ObjId {
    match v {
        Var::Obj(o) => *o,
        Var::Int(i) => ObjId(*i),
        Var::Str(s) => {
            let text = String::from_utf8_lossy(s);
            let text = text.trim().trim_start_matches('#');
            ObjId(text.parse().unwrap_or(-1))
        }
        _ => ObjId::NOTHING,
    }
}

/// `toliteral`: a MOO-source-reparsable textual form.
pub fn toliteral(v: &Var) -> Var {
    let s = match v {
        Var::Str(s) => {
            let mut out = Vec::with_capacity(s.len() + 2);
            out.push(b'"');
            for &b in s.iter() {
                if b == b'"' || b == b'\\' {
                    out.push(b'\\');
                }
                out.push(b);
            }
            out.push(b'"');
            out
        }
        Var::List(l) => {
            let mut out = Vec::new();
            out.push(b'{');
            for (i, item) in l.iter().enumerate() {
                if i > 0 {
                    out.extend_from_slice(b", ");
                }
                if let Var::Str(s) = toliteral(item) {
                    out.extend_from_slice(&s);
                }
            }
            out.push(b'}');
            out
        }
        other => format!("{other}").into_bytes(),
    };
    Var::Str(Arc::new(s))
}

pub fn typeof_tag(v: &Var) -> Var {
    Var::Int(v.type_tag())
}
