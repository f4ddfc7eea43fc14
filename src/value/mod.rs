//! C1: the tagged value algebra and error-code taxonomy (spec §3.1, §4.1).

pub mod arith;
pub mod convert;
pub mod error_code;
pub mod var;

pub use error_code::ErrorCode;
pub use var::{AnonRef, MapKey, ObjId, Var, WaifRef};
