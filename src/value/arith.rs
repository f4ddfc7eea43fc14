//! Arithmetic, comparison, and aggregate-mutation operators (spec §4.1).
//!
//! No implicit numeric coercion: `INT op FLOAT` is always `E_TYPE`. The
//! handful of cross-type exceptions (`STR * INT`, `STR + STR`, `LIST +
//! LIST`, `FLOAT ^ INT`) are called out explicitly below rather than
//! folded into a generic dispatch table, since they are the exceptions
//! the spec enumerates, not the rule.

use std::sync::Arc;

use super::error_code::ErrorCode;
use super::var::{checked_float, MapKey, Var};

pub type VResult = Result<Var, ErrorCode>;

pub fn add(a: &Var, b: &Var) -> VResult {
    match (a, b) {
        (Var::Int(x), Var::Int(y)) => Ok(Var::Int(x.wrapping_add(*y))),
        (Var::Float(x), Var::Float(y)) => Ok(Var::Float(checked_float(x + y)?)),
        (Var::Str(x), Var::Str(y)) => {
            let mut s = (**x).clone();
            s.extend_from_slice(y);
            Ok(Var::str(s))
        }
        (Var::List(x), Var::List(y)) => {
            let mut v = (**x).clone();
            v.extend(y.iter().cloned());
            Ok(Var::list(v))
        }
        _ => Err(ErrorCode::Type),
    }
}

pub fn sub(a: &Var, b: &Var) -> VResult {
    match (a, b) {
        (Var::Int(x), Var::Int(y)) => Ok(Var::Int(x.wrapping_sub(*y))),
        (Var::Float(x), Var::Float(y)) => Ok(Var::Float(checked_float(x - y)?)),
        _ => Err(ErrorCode::Type),
    }
}

pub fn mul(a: &Var, b: &Var) -> VResult {
    match (a, b) {
        (Var::Int(x), Var::Int(y)) => Ok(Var::Int(x.wrapping_mul(*y))),
        (Var::Float(x), Var::Float(y)) => Ok(Var::Float(checked_float(x * y)?)),
        (Var::Str(s), Var::Int(n)) | (Var::Int(n), Var::Str(s)) => {
            if *n < 0 {
                return Err(ErrorCode::Invarg);
            }
            let mut out = Vec::with_capacity(s.len() * (*n as usize));
            for _ in 0..*n {
                out.extend_from_slice(s);
            }
            Ok(Var::str(out))
        }
        _ => Err(ErrorCode::Type),
    }
}

pub fn div(a: &Var, b: &Var) -> VResult {
    match (a, b) {
        (Var::Int(_), Var::Int(0)) => Err(ErrorCode::Div),
        // Integer division truncates toward zero (spec §4.1, property 11).
        (Var::Int(x), Var::Int(y)) => Ok(Var::Int(x.wrapping_div(*y))),
        (Var::Float(_), Var::Float(y)) if *y == 0.0 => Err(ErrorCode::Div),
        (Var::Float(x), Var::Float(y)) => Ok(Var::Float(checked_float(x / y)?)),
        _ => Err(ErrorCode::Type),
    }
}

pub fn modulo(a: &Var, b: &Var) -> VResult {
    match (a, b) {
        (Var::Int(_), Var::Int(0)) => Err(ErrorCode::Div),
        // Modulo sign follows the dividend, i.e. Rust's `%` on i64 already.
        (Var::Int(x), Var::Int(y)) => Ok(Var::Int(x.wrapping_rem(*y))),
        (Var::Float(_), Var::Float(y)) if *y == 0.0 => Err(ErrorCode::Div),
        (Var::Float(x), Var::Float(y)) => Ok(Var::Float(checked_float(x % y)?)),
        _ => Err(ErrorCode::Type),
    }
}

pub fn pow(a: &Var, b: &Var) -> VResult {
    match (a, b) {
        (Var::Int(x), Var::Int(y)) => {
            if *y < 0 {
                return Err(ErrorCode::Type);
            }
            Ok(Var::Int(x.wrapping_pow(*y as u32)))
        }
        (Var::Float(x), Var::Int(y)) => Ok(Var::Float(checked_float(x.powi(*y as i32))?)),
        (Var::Float(x), Var::Float(y)) => Ok(Var::Float(checked_float(x.powf(*y))?)),
        // INT ^ FLOAT is always E_TYPE per spec.
        _ => Err(ErrorCode::Type),
    }
}

pub fn neg(a: &Var) -> VResult {
    match a {
        Var::Int(x) => Ok(Var::Int(x.wrapping_neg())),
        Var::Float(x) => Ok(Var::Float(checked_float(-x)?)),
        _ => Err(ErrorCode::Type),
    }
}

fn as_ints(a: &Var, b: &Var) -> Result<(i64, i64), ErrorCode> {
    match (a, b) {
        (Var::Int(x), Var::Int(y)) => Ok((*x, *y)),
        _ => Err(ErrorCode::Type),
    }
}

pub fn bitand(a: &Var, b: &Var) -> VResult {
    as_ints(a, b).map(|(x, y)| Var::Int(x & y))
}

pub fn bitor(a: &Var, b: &Var) -> VResult {
    as_ints(a, b).map(|(x, y)| Var::Int(x | y))
}

pub fn bitxor(a: &Var, b: &Var) -> VResult {
    as_ints(a, b).map(|(x, y)| Var::Int(x ^ y))
}

pub fn shl(a: &Var, b: &Var) -> VResult {
    let (x, y) = as_ints(a, b)?;
    if y < 0 {
        return Err(ErrorCode::Invarg);
    }
    Ok(Var::Int(if y >= 64 { 0 } else { x.wrapping_shl(y as u32) }))
}

/// Right shift is arithmetic (sign-extending) per spec §4.1.
pub fn shr(a: &Var, b: &Var) -> VResult {
    let (x, y) = as_ints(a, b)?;
    if y < 0 {
        return Err(ErrorCode::Invarg);
    }
    Ok(Var::Int(if y >= 64 {
        if x < 0 {
            -1
        } else {
            0
        }
    } else {
        x.wrapping_shr(y as u32)
    }))
}

/// Resolves `^`/`$` index sugar against a collection length, per spec
/// §4.1: `^` substitutes `1`, `$` substitutes `length`, evaluated before
/// bounds checks. Callers pass the raw index already evaluated (with `^`
/// and `$` already replaced by the compiler/VM), this is the shared
/// bounds check for 1-based indexing.
pub fn check_index(index: i64, len: usize) -> Result<usize, ErrorCode> {
    if index < 1 || index as usize > len {
        return Err(ErrorCode::Range);
    }
    Ok(index as usize - 1)
}

pub fn index_get(v: &Var, index: i64) -> VResult {
    match v {
        Var::List(l) => {
            let i = check_index(index, l.len())?;
            Ok(l[i].clone())
        }
        Var::Str(s) => {
            let i = check_index(index, s.len())?;
            Ok(Var::str(vec![s[i]]))
        }
        Var::Map(m) => {
            // Maps are not indexable by integer position in MOO; indexing
            // requires a literal key lookup, handled by the caller via
            // `map_get`.
            let _ = m;
            Err(ErrorCode::Type)
        }
        _ => Err(ErrorCode::Type),
    }
}

/// Indexed assignment. Mutates `*v` in place, cloning the backing `Arc`
/// storage iff its refcount is greater than one (copy-on-write, spec
/// §4.1, property 3).
pub fn index_set(v: &mut Var, index: i64, value: Var) -> Result<(), ErrorCode> {
    match v {
        Var::List(l) => {
            let i = check_index(index, l.len())?;
            Arc::make_mut(l)[i] = value;
            Ok(())
        }
        Var::Str(s) => {
            let i = check_index(index, s.len())?;
            let byte = match &value {
                Var::Str(b) if b.len() == 1 => b[0],
                _ => return Err(ErrorCode::Type),
            };
            Arc::make_mut(s)[i] = byte;
            Ok(())
        }
        _ => Err(ErrorCode::Type),
    }
}

/// Range bounds resolved from already-evaluated `a`/`b` (post `^`/`$`
/// substitution). `a > b` is legal and yields an empty range (spec §4.1).
fn range_bounds(a: i64, b: i64, len: usize) -> Result<(usize, usize), ErrorCode> {
    if a > b {
        return Ok((1, 0));
    }
    if a < 1 || b as usize > len {
        return Err(ErrorCode::Range);
    }
    Ok((a as usize, b as usize))
}

pub fn range_get(v: &Var, a: i64, b: i64) -> VResult {
    match v {
        Var::List(l) => {
            let (lo, hi) = range_bounds(a, b, l.len())?;
            if lo > hi {
                return Ok(Var::empty_list());
            }
            Ok(Var::list(l[lo - 1..hi].to_vec()))
        }
        Var::Str(s) => {
            let (lo, hi) = range_bounds(a, b, s.len())?;
            if lo > hi {
                return Ok(Var::str(Vec::new()));
            }
            Ok(Var::str(s[lo - 1..hi].to_vec()))
        }
        _ => Err(ErrorCode::Type),
    }
}

/// Bounds for a range-assignment splice: `1 <= a <= len+1` always (an
/// insertion point one past the end is legal); when `a <= b` additionally
/// requires `b <= len`. Returns the splice range `lo-1..hi` in 0-based
/// indices (possibly empty, when `a > b`).
fn range_set_bounds(a: i64, b: i64, len: usize) -> Result<(usize, usize), ErrorCode> {
    if a < 1 || a as usize > len + 1 {
        return Err(ErrorCode::Range);
    }
    if a > b {
        let lo = a as usize - 1;
        return Ok((lo, lo));
    }
    if b as usize > len {
        return Err(ErrorCode::Range);
    }
    Ok((a as usize - 1, b as usize))
}

/// Range assignment: RHS must be a LIST (for list targets) or STR (for
/// string targets); it may grow or shrink the target (spec §4.1).
pub fn range_set(v: &mut Var, a: i64, b: i64, rhs: Var) -> Result<(), ErrorCode> {
    match v {
        Var::List(l) => {
            let rhs = match rhs {
                Var::List(r) => (*r).clone(),
                _ => return Err(ErrorCode::Type),
            };
            let (lo, hi) = range_set_bounds(a, b, l.len())?;
            Arc::make_mut(l).splice(lo..hi, rhs);
            Ok(())
        }
        Var::Str(s) => {
            let rhs = match rhs {
                Var::Str(r) => (*r).clone(),
                _ => return Err(ErrorCode::Type),
            };
            let (lo, hi) = range_set_bounds(a, b, s.len())?;
            Arc::make_mut(s).splice(lo..hi, rhs);
            Ok(())
        }
        _ => Err(ErrorCode::Type),
    }
}

pub fn list_append(v: &mut Var, value: Var, after_index: Option<i64>) -> Result<(), ErrorCode> {
    let Var::List(l) = v else {
        return Err(ErrorCode::Type);
    };
    let list = Arc::make_mut(l);
    match after_index {
        None => list.push(value),
        Some(idx) => {
            if idx == 0 {
                list.insert(0, value);
            } else {
                let i = check_index(idx, list.len())?;
                list.insert(i + 1, value);
            }
        }
    }
    Ok(())
}

pub fn list_insert(v: &mut Var, index: i64, value: Var) -> Result<(), ErrorCode> {
    let Var::List(l) = v else {
        return Err(ErrorCode::Type);
    };
    let list = Arc::make_mut(l);
    if index <= 0 {
        list.insert(0, value);
        return Ok(());
    }
    let i = (index as usize - 1).min(list.len());
    list.insert(i, value);
    Ok(())
}

pub fn list_delete(v: &mut Var, index: i64) -> Result<(), ErrorCode> {
    let Var::List(l) = v else {
        return Err(ErrorCode::Type);
    };
    let list = Arc::make_mut(l);
    let i = check_index(index, list.len())?;
    list.remove(i);
    Ok(())
}

pub fn map_insert(v: &mut Var, key: &Var, value: Var) -> Result<(), ErrorCode> {
    let Var::Map(m) = v else {
        return Err(ErrorCode::Type);
    };
    let key = MapKey::from_var(key).ok_or(ErrorCode::Type)?;
    Arc::make_mut(m).insert(key, value);
    Ok(())
}

pub fn map_delete(v: &mut Var, key: &Var) -> Result<(), ErrorCode> {
    let Var::Map(m) = v else {
        return Err(ErrorCode::Type);
    };
    let key = MapKey::from_var(key).ok_or(ErrorCode::Type)?;
    let map = Arc::make_mut(m);
    if map.remove(&key).is_none() {
        return Err(ErrorCode::Range);
    }
    Ok(())
}

/// `x in list`: 1-based position of the first `eq_moo` match, or `Int(0)`
/// when absent. Returns `E_TYPE` if the right side isn't a LIST.
pub fn in_list(needle: &Var, haystack: &Var) -> VResult {
    let Var::List(l) = haystack else {
        return Err(ErrorCode::Type);
    };
    match l.iter().position(|v| v.eq_moo(needle)) {
        Some(i) => Ok(Var::Int(i as i64 + 1)),
        None => Ok(Var::Int(0)),
    }
}

/// Relational ordering for `<`/`<=`/`>`/`>=`. Only INT/FLOAT/STR/OBJ support
/// ordering in MOO; mixed INT/FLOAT comparisons are `E_TYPE` like every
/// other mixed-numeric operator (spec §4.1).
pub fn compare(a: &Var, b: &Var) -> Result<std::cmp::Ordering, ErrorCode> {
    match (a, b) {
        (Var::Int(x), Var::Int(y)) => Ok(x.cmp(y)),
        (Var::Float(x), Var::Float(y)) => x.partial_cmp(y).ok_or(ErrorCode::Float),
        (Var::Str(x), Var::Str(y)) => Ok(x.cmp(y)),
        (Var::Obj(x), Var::Obj(y)) => Ok(x.0.cmp(&y.0)),
        _ => Err(ErrorCode::Type),
    }
}

pub fn map_get(v: &Var, key: &Var) -> VResult {
    let Var::Map(m) = v else {
        return Err(ErrorCode::Type);
    };
    let key = MapKey::from_var(key).ok_or(ErrorCode::Type)?;
    m.get(&key).cloned().ok_or(ErrorCode::Range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cow_isolation() {
        // a={1,2,3}; b=a; b[1]=99; => a=={1,2,3}, b=={99,2,3}
        let a = Var::list(vec![Var::Int(1), Var::Int(2), Var::Int(3)]);
        let mut b = a.clone();
        index_set(&mut b, 1, Var::Int(99)).unwrap();
        assert!(a.eq_moo(&Var::list(vec![Var::Int(1), Var::Int(2), Var::Int(3)])));
        assert!(b.eq_moo(&Var::list(vec![Var::Int(99), Var::Int(2), Var::Int(3)])));
    }

    #[test]
    fn range_inclusive_and_empty() {
        let l = Var::list((1..=5).map(Var::Int).collect());
        assert!(range_get(&l, 3, 1).unwrap().eq_moo(&Var::empty_list()));
        let l3 = Var::list((1..=3).map(Var::Int).collect());
        assert_eq!(range_get(&l3, 2, 100), Err(ErrorCode::Range));
    }

    #[test]
    fn int_division_truncates_toward_zero() {
        assert_eq!(div(&Var::Int(-7), &Var::Int(2)), Ok(Var::Int(-3)));
        assert_eq!(modulo(&Var::Int(-7), &Var::Int(3)), Ok(Var::Int(-1)));
    }

    #[test]
    fn arithmetic_identity_holds() {
        for a in [-17_i64, -1, 0, 1, 22, i64::MIN + 1] {
            for b in [-5_i64, -1, 1, 3, 7] {
                let q = div(&Var::Int(a), &Var::Int(b)).unwrap();
                let r = modulo(&Var::Int(a), &Var::Int(b)).unwrap();
                let lhs = add(&mul(&q, &Var::Int(b)).unwrap(), &r).unwrap();
                assert!(lhs.eq_moo(&Var::Int(a)));
            }
        }
    }

    #[test]
    fn right_shift_is_arithmetic() {
        assert_eq!(shr(&Var::Int(-8), &Var::Int(1)), Ok(Var::Int(-4)));
        assert_eq!(shr(&Var::Int(-1), &Var::Int(10)), Ok(Var::Int(-1)));
    }

    #[test]
    fn power_right_associativity_value() {
        // 2^(3^2) == 2^9 == 512; parsing right-associativity is a compiler
        // concern, this only checks the arithmetic itself.
        let inner = pow(&Var::Int(3), &Var::Int(2)).unwrap();
        let outer = pow(&Var::Int(2), &inner).unwrap();
        assert!(outer.eq_moo(&Var::Int(512)));
    }

    #[test]
    fn equality_is_type_strict() {
        assert!(!Var::Int(1).eq_moo(&Var::Float(1.0)));
    }

    #[test]
    fn map_equality_ignores_order() {
        use std::collections::BTreeMap;
        let mut m1 = BTreeMap::new();
        m1.insert(MapKey::Str(b"a".to_vec()), Var::Int(1));
        m1.insert(MapKey::Str(b"b".to_vec()), Var::Int(2));
        let mut m2 = BTreeMap::new();
        m2.insert(MapKey::Str(b"b".to_vec()), Var::Int(2));
        m2.insert(MapKey::Str(b"a".to_vec()), Var::Int(1));
        assert!(Var::map(m1).eq_moo(&Var::map(m2)));
    }
}

