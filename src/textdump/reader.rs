//! Low-level line/byte cursor over an in-memory textdump (spec §4.3). The
//! whole file is read into memory up front — textdumps are, by design, a
//! single self-contained checkpoint, not a stream — which lets every value
//! decode (including length-prefixed strings) work by slicing rather than
//! incremental buffering.

use crate::value::{ErrorCode, MapKey, ObjId, Var};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("unexpected end of textdump input")]
    Eof,
    #[error("malformed integer at byte {0}: {1:?}")]
    BadInt(usize, String),
    #[error("malformed float at byte {0}: {1:?}")]
    BadFloat(usize, String),
    #[error("unknown value tag {0} at byte {1}")]
    BadTag(i64, usize),
    #[error("unknown error code {0}")]
    BadErrorCode(i64),
    #[error("malformed header line: {0:?}")]
    BadHeader(String),
    #[error("unsupported database version: {0}")]
    UnsupportedVersion(String),
    #[error("malformed object header: {0:?}")]
    BadObjectHeader(String),
    #[error("verb-code block for #{0}:{1} is missing its `.` terminator")]
    UnterminatedVerbCode(i64, usize),
    #[error("{0}")]
    Compile(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub fn at_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Reads up to (and consuming) the next `\n`, returning the bytes
    /// before it. Latin-1 text, so no UTF-8 validation happens here.
    pub fn read_line_bytes(&mut self) -> Result<&'a [u8], ReadError> {
        if self.pos >= self.buf.len() {
            return Err(ReadError::Eof);
        }
        let start = self.pos;
        let end = self.buf[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| start + i)
            .unwrap_or(self.buf.len());
        self.pos = (end + 1).min(self.buf.len());
        Ok(&self.buf[start..end])
    }

    /// Latin-1 -> `String`: every byte maps 1:1 onto its codepoint, so this
    /// never loses information the way UTF-8 lossy decoding would (spec §9:
    /// "the runtime must never perform Unicode normalization").
    pub fn read_line_str(&mut self) -> Result<String, ReadError> {
        Ok(self.read_line_bytes()?.iter().map(|&b| b as char).collect())
    }

    pub fn read_int(&mut self) -> Result<i64, ReadError> {
        let line = self.read_line_str()?;
        line.trim()
            .parse()
            .map_err(|_| ReadError::BadInt(self.pos, line))
    }

    pub fn read_float(&mut self) -> Result<f64, ReadError> {
        let line = self.read_line_str()?;
        line.trim()
            .parse()
            .map_err(|_| ReadError::BadFloat(self.pos, line))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        if self.pos + n > self.buf.len() {
            return Err(ReadError::Eof);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Consumes exactly one `\n` (used after a length-prefixed byte read).
    fn expect_newline(&mut self) -> Result<(), ReadError> {
        if self.pos < self.buf.len() && self.buf[self.pos] == b'\n' {
            self.pos += 1;
            Ok(())
        } else {
            Err(ReadError::Eof)
        }
    }

    pub fn read_obj(&mut self) -> Result<ObjId, ReadError> {
        Ok(ObjId(self.read_int()?))
    }

    /// `count` then that many ids, one per line — the list-of-ids idiom
    /// used throughout object headers (contents/parents/children).
    pub fn read_obj_list(&mut self) -> Result<Vec<ObjId>, ReadError> {
        let n = self.read_int()?;
        (0..n).map(|_| self.read_obj()).collect()
    }

    /// Reads one fully tagged value (spec §3.1/§4.3): a tag line, then its
    /// payload, recursing for LIST/MAP.
    pub fn read_value(&mut self) -> Result<Var, ReadError> {
        let tag = self.read_int()?;
        match tag {
            0 => Ok(Var::Int(self.read_int()?)),
            1 => Ok(Var::Obj(self.read_obj()?)),
            2 => {
                let len = self.read_int()? as usize;
                let bytes = self.read_bytes(len)?.to_vec();
                self.expect_newline()?;
                Ok(Var::Str(Arc::new(bytes)))
            }
            3 => {
                let code = self.read_int()?;
                let code = ErrorCode::from_u8(code as u8).ok_or(ReadError::BadErrorCode(code))?;
                Ok(Var::Err(code))
            }
            4 => {
                let n = self.read_int()?;
                let items = (0..n).map(|_| self.read_value()).collect::<Result<_, _>>()?;
                Ok(Var::List(Arc::new(items)))
            }
            5 => Ok(Var::Clear),
            6 => Ok(Var::None),
            9 => Ok(Var::Float(self.read_float()?)),
            10 => {
                let n = self.read_int()?;
                let mut m = BTreeMap::new();
                for _ in 0..n {
                    let k = self.read_value()?;
                    let v = self.read_value()?;
                    let key = MapKey::from_var(&k).ok_or(ReadError::BadTag(10, self.pos))?;
                    m.insert(key, v);
                }
                Ok(Var::Map(Arc::new(m)))
            }
            14 => {
                let b = self.read_int()?;
                Ok(Var::Bool(b != 0))
            }
            other => Err(ReadError::BadTag(other, self.pos)),
        }
    }
}
