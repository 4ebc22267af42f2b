use crate::schema::{BYTEA_EXTERNAL_TABLE, BYTEA_TABLE, LO_TABLE};
use std::fmt;

/// One way of storing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Plain temporary file.
    File,
    /// Inline `bytea` column.
    Bytea,
    /// `bytea` column with storage forced to `EXTERNAL`.
    ByteaExternal,
    /// `lo` column referencing a large object.
    LargeObject,
}

impl Strategy {
    /// Benchmark order.
    pub const ALL: [Strategy; 4] = [
        Strategy::File,
        Strategy::Bytea,
        Strategy::ByteaExternal,
        Strategy::LargeObject,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Strategy::File => "file",
            Strategy::Bytea => "bytea",
            Strategy::ByteaExternal => "bytea_external",
            Strategy::LargeObject => "lo",
        }
    }

    pub fn table(self) -> Option<&'static str> {
        match self {
            Strategy::File => None,
            Strategy::Bytea => Some(BYTEA_TABLE),
            Strategy::ByteaExternal => Some(BYTEA_EXTERNAL_TABLE),
            Strategy::LargeObject => Some(LO_TABLE),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
