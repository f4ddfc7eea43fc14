//! The 18 MOO error codes. These are first-class `ERR`-tagged values, not
//! Rust-level error types that abort a call — see [`crate::error`] for the
//! Rust-API-boundary error enum that wraps them.

use std::fmt;

/// One of LambdaMOO's fixed error codes. Ordinal values match the wire
/// encoding used by the textdump codec (`ERR` payload is this as `u8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    None = 0,
    Type = 1,
    Div = 2,
    Perm = 3,
    PropNF = 4,
    VerbNF = 5,
    VarNF = 6,
    Invind = 7,
    Recmove = 8,
    MaxRec = 9,
    Range = 10,
    Args = 11,
    Nacc = 12,
    Invarg = 13,
    Quota = 14,
    Float = 15,
    File = 16,
    Exec = 17,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 18] = [
        ErrorCode::None,
        ErrorCode::Type,
        ErrorCode::Div,
        ErrorCode::Perm,
        ErrorCode::PropNF,
        ErrorCode::VerbNF,
        ErrorCode::VarNF,
        ErrorCode::Invind,
        ErrorCode::Recmove,
        ErrorCode::MaxRec,
        ErrorCode::Range,
        ErrorCode::Args,
        ErrorCode::Nacc,
        ErrorCode::Invarg,
        ErrorCode::Quota,
        ErrorCode::Float,
        ErrorCode::File,
        ErrorCode::Exec,
    ];

    pub fn from_u8(b: u8) -> Option<ErrorCode> {
        Self::ALL.into_iter().find(|e| *e as u8 == b)
    }

    /// The bare mnemonic, e.g. `E_TYPE`, as it appears in MOO source and in
    /// `toliteral` output.
    pub fn mnemonic(self) -> &'static str {
        match self {
            ErrorCode::None => "E_NONE",
            ErrorCode::Type => "E_TYPE",
            ErrorCode::Div => "E_DIV",
            ErrorCode::Perm => "E_PERM",
            ErrorCode::PropNF => "E_PROPNF",
            ErrorCode::VerbNF => "E_VERBNF",
            ErrorCode::VarNF => "E_VARNF",
            ErrorCode::Invind => "E_INVIND",
            ErrorCode::Recmove => "E_RECMOVE",
            ErrorCode::MaxRec => "E_MAXREC",
            ErrorCode::Range => "E_RANGE",
            ErrorCode::Args => "E_ARGS",
            ErrorCode::Nacc => "E_NACC",
            ErrorCode::Invarg => "E_INVARG",
            ErrorCode::Quota => "E_QUOTA",
            ErrorCode::Float => "E_FLOAT",
            ErrorCode::File => "E_FILE",
            ErrorCode::Exec => "E_EXEC",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<ErrorCode> {
        Self::ALL.into_iter().find(|e| e.mnemonic() == s)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
