//! C3: a bit-exact reader/writer for the versioned textual database format
//! (spec §4.3). `read_textdump`/`write_textdump` are the two public entry
//! points; everything else here is organized the way the reference
//! `rdaum-moor` textdump crate splits "header/version detection",
//! "per-value codec", "object/verb block codec", and "task codec" into
//! separate concerns (see DESIGN.md for the specific files this is
//! grounded on).

mod object_codec;
mod reader;
mod task_codec;
mod writer;

mod dump;
mod load;

pub use dump::{write_textdump, write_textdump_file, DumpError};
pub use load::{read_textdump, read_textdump_file, LoadedDatabase};
pub use reader::ReadError;

/// The header line's declared format version. Only v4 (read-only) and v17
/// (read/write) are recognized (spec §4.3/§6); anything else is rejected
/// up front rather than partially parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbVersion {
    V4,
    V17,
}

pub const HEADER_PREFIX: &str = "** LambdaMOO Database, Format Version ";
pub const HEADER_SUFFIX: &str = " **";

impl DbVersion {
    pub fn parse_header(line: &str) -> Result<DbVersion, ReadError> {
        let inner = line
            .strip_prefix(HEADER_PREFIX)
            .and_then(|s| s.strip_suffix(HEADER_SUFFIX))
            .ok_or_else(|| ReadError::BadHeader(line.to_string()))?;
        match inner {
            "4" => Ok(DbVersion::V4),
            "17" => Ok(DbVersion::V17),
            other => Err(ReadError::UnsupportedVersion(other.to_string())),
        }
    }

    pub fn header_line(self) -> String {
        let n = match self {
            DbVersion::V4 => "4",
            DbVersion::V17 => "17",
        };
        format!("{HEADER_PREFIX}{n}{HEADER_SUFFIX}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let line = DbVersion::V17.header_line();
        assert_eq!(DbVersion::parse_header(&line).unwrap(), DbVersion::V17);
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(DbVersion::parse_header("** LambdaMOO Database, Format Version 99 **").is_err());
    }
}
