//! The mirror image of `reader.rs`: a flat byte buffer builder plus one
//! `write_*` method per `read_*` method there. Every encode is written so
//! that `write(read(f))` round-trips (spec §4.3 critical invariant).

use crate::value::{ObjId, Var};
use std::fmt::Display;

pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_line(&mut self, v: impl Display) {
        let s = v.to_string();
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(b'\n');
    }

    pub fn write_int(&mut self, v: i64) {
        self.write_line(v);
    }

    pub fn write_float(&mut self, v: f64) {
        // Round-trips exactly: Rust's `Display` for `f64` always emits
        // enough digits to reparse to the same bit pattern.
        self.write_line(v);
    }

    pub fn write_obj(&mut self, v: ObjId) {
        self.write_int(v.0);
    }

    pub fn write_obj_list(&mut self, ids: &[ObjId]) {
        self.write_int(ids.len() as i64);
        for id in ids {
            self.write_obj(*id);
        }
    }

    pub fn write_value(&mut self, v: &Var) {
        // Anonymous objects and waifs have no stable cross-checkpoint
        // identity (spec §3.2/§9); a value of this type surviving to a
        // checkpoint write is collapsed to `none` — tag and all — rather
        // than emitting their own tag with an empty payload `reader.rs`
        // has no arm for.
        if matches!(v, Var::Anon(_) | Var::Waif(_)) {
            self.write_int(Var::None.type_tag());
            return;
        }
        self.write_int(v.type_tag());
        match v {
            Var::Int(i) => self.write_int(*i),
            Var::Obj(o) => self.write_obj(*o),
            Var::Str(s) => {
                self.write_int(s.len() as i64);
                self.buf.extend_from_slice(s);
                self.buf.push(b'\n');
            }
            Var::Err(e) => self.write_int(*e as i64),
            Var::List(items) => {
                self.write_int(items.len() as i64);
                for item in items.iter() {
                    self.write_value(item);
                }
            }
            Var::Clear | Var::None => {}
            Var::Float(f) => self.write_float(*f),
            Var::Map(m) => {
                self.write_int(m.len() as i64);
                for (k, v) in m.iter() {
                    self.write_value(&k.to_var());
                    self.write_value(v);
                }
            }
            Var::Bool(b) => self.write_int(*b as i64),
            Var::Anon(_) | Var::Waif(_) => unreachable!(),
        }
    }

    /// Placeholder used in place of a real tag/payload when a slot is
    /// genuinely absent (e.g. a clear property's value line) — writes a
    /// `NONE` value so downstream line-counting stays in lockstep without
    /// a separate "value present?" flag.
    pub fn write_value_or_none(&mut self, v: Option<&Var>) {
        match v {
            Some(v) => self.write_value(v),
            None => self.write_value(&Var::None),
        }
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}
