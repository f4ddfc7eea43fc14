//! The tagged value algebra (spec §3.1, §4.1).
//!
//! `Var` is the dynamic value type every MOO expression evaluates to. Lists
//! and maps are `Arc`-backed so `Clone` is O(1); any mutating helper calls
//! `Arc::make_mut`, which clones the backing storage only when the
//! refcount is greater than one (copy-on-write, spec §4.1).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::error_code::ErrorCode;

/// A persistent object id. Negative values are used for a handful of
/// sentinels (`NOTHING = -1`, `AMBIGUOUS = -2`, `FAILED_MATCH = -3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjId(pub i64);

impl ObjId {
    pub const NOTHING: ObjId = ObjId(-1);
    pub const AMBIGUOUS: ObjId = ObjId(-2);
    pub const FAILED_MATCH: ObjId = ObjId(-3);
    pub const SYSTEM: ObjId = ObjId(0);
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference to a heap-allocated anonymous object (spec §3.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnonRef(pub Arc<u64>);

/// A reference to a lightweight waif prototype record (GLOSSARY).
#[derive(Debug, Clone)]
pub struct WaifRef {
    pub class: ObjId,
    pub props: Arc<BTreeMap<String, Var>>,
}

impl PartialEq for WaifRef {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && *self.props == *other.props
    }
}

/// Map keys must be totally ordered for a `BTreeMap` backing store, and
/// must implement MOO equality/ordering (value types only: INT/OBJ/STR
/// in practice, but the format is not restricted at the type level).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    Int(i64),
    Obj(i64),
    Str(Vec<u8>),
    Bool(bool),
}

/// The nine dynamic types, tag values per spec §3.1.
#[derive(Debug, Clone)]
pub enum Var {
    Int(i64),
    Obj(ObjId),
    Str(Arc<Vec<u8>>),
    Err(ErrorCode),
    List(Arc<Vec<Var>>),
    Clear,
    None,
    Float(f64),
    Map(Arc<BTreeMap<MapKey, Var>>),
    Anon(AnonRef),
    Waif(WaifRef),
    Bool(bool),
}

impl Var {
    pub fn str(s: impl Into<Vec<u8>>) -> Var {
        Var::Str(Arc::new(s.into()))
    }

    pub fn list(v: Vec<Var>) -> Var {
        Var::List(Arc::new(v))
    }

    pub fn empty_list() -> Var {
        Var::List(Arc::new(Vec::new()))
    }

    pub fn map(m: BTreeMap<MapKey, Var>) -> Var {
        Var::Map(Arc::new(m))
    }

    pub fn type_tag(&self) -> i64 {
        match self {
            Var::Int(_) => 0,
            Var::Obj(_) => 1,
            Var::Str(_) => 2,
            Var::Err(_) => 3,
            Var::List(_) => 4,
            Var::Clear => 5,
            Var::None => 6,
            Var::Float(_) => 9,
            Var::Map(_) => 10,
            Var::Anon(_) => 12,
            Var::Waif(_) => 13,
            Var::Bool(_) => 14,
        }
    }

    /// MOO truthiness: `0`, `0.0`, `""`, `{}`, `[]`, `false` are the only
    /// falsy values (spec §4.1).
    pub fn is_true(&self) -> bool {
        match self {
            Var::Int(i) => *i != 0,
            Var::Float(f) => *f != 0.0,
            Var::Str(s) => !s.is_empty(),
            Var::List(l) => !l.is_empty(),
            Var::Map(m) => !m.is_empty(),
            Var::Bool(b) => *b,
            Var::Obj(_) | Var::Err(_) | Var::Clear | Var::None | Var::Anon(_) | Var::Waif(_) => {
                true
            }
        }
    }

    /// Deep structural equality. Map equality ignores iteration order
    /// because the backing `BTreeMap` is already canonically ordered by
    /// key, so `PartialEq` on the maps already has this property; listed
    /// here for clarity since it is a tested invariant (spec §8, property
    /// 6).
    pub fn eq_moo(&self, other: &Var) -> bool {
        match (self, other) {
            (Var::Int(a), Var::Int(b)) => a == b,
            (Var::Float(a), Var::Float(b)) => a == b,
            (Var::Obj(a), Var::Obj(b)) => a == b,
            (Var::Str(a), Var::Str(b)) => a == b,
            (Var::Err(a), Var::Err(b)) => a == b,
            (Var::Bool(a), Var::Bool(b)) => a == b,
            (Var::Clear, Var::Clear) | (Var::None, Var::None) => true,
            (Var::List(a), Var::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_moo(y))
            }
            (Var::Map(a), Var::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|v2| v.eq_moo(v2)))
            }
            (Var::Waif(a), Var::Waif(b)) => a == b,
            (Var::Anon(a), Var::Anon(b)) => a == b,
            // No implicit numeric coercion even for equality: 1 == 1.0 is false.
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Var::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Var::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            Var::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Var]> {
        match self {
            Var::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<ObjId> {
        match self {
            Var::Obj(o) => Some(*o),
            _ => None,
        }
    }

    /// `length()`: byte length for strings, element count for lists/maps.
    /// No Unicode awareness (spec §9 Design Notes): `length` always counts
    /// bytes, never codepoints.
    pub fn moo_length(&self) -> Option<usize> {
        match self {
            Var::Str(s) => Some(s.len()),
            Var::List(l) => Some(l.len()),
            Var::Map(m) => Some(m.len()),
            _ => None,
        }
    }
}

/// A finite, in-domain float. Any arithmetic producing NaN or +-Inf must
/// raise `E_FLOAT` instead of constructing this (spec §3.1).
pub fn checked_float(v: f64) -> Result<f64, ErrorCode> {
    if v.is_nan() || v.is_infinite() {
        Err(ErrorCode::Float)
    } else {
        Ok(v)
    }
}

impl MapKey {
    pub fn from_var(v: &Var) -> Option<MapKey> {
        match v {
            Var::Int(i) => Some(MapKey::Int(*i)),
            Var::Obj(o) => Some(MapKey::Obj(o.0)),
            Var::Str(s) => Some(MapKey::Str((**s).clone())),
            Var::Bool(b) => Some(MapKey::Bool(*b)),
            _ => None,
        }
    }

    pub fn to_var(&self) -> Var {
        match self {
            MapKey::Int(i) => Var::Int(*i),
            MapKey::Obj(o) => Var::Obj(ObjId(*o)),
            MapKey::Str(s) => Var::Str(Arc::new(s.clone())),
            MapKey::Bool(b) => Var::Bool(*b),
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Int(i) => write!(f, "{i}"),
            Var::Float(v) => write!(f, "{v}"),
            Var::Obj(o) => write!(f, "{o}"),
            Var::Str(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            Var::Err(e) => write!(f, "{e}"),
            Var::Bool(b) => write!(f, "{b}"),
            Var::Clear => write!(f, "<clear>"),
            Var::None => write!(f, "<none>"),
            Var::List(l) => {
                write!(f, "{{")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
            Var::Map(m) => {
                write!(f, "[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} -> {v}", k.to_var())?;
                }
                write!(f, "]")
            }
            Var::Anon(_) => write!(f, "*anonymous*"),
            Var::Waif(w) => write!(f, "[waif of {}]", w.class),
        }
    }
}

/// Ordering used only for map-key placement and `sort`-family builtins;
/// distinct from `eq_moo`'s strict type semantics because `BTreeMap`
/// requires a total order over the key enum's variants.
impl PartialOrd for Var {
    fn partial_cmp(&self, _other: &Self) -> Option<Ordering> {
        None
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.eq_moo(other)
    }
}
impl Eq for Var {}
