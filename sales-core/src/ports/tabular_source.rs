//! Tabular source port
//!
//! Defines the interface for reading a header-driven table from a file
//! (CSV, Excel workbooks). Sources only parse structure; validation is the
//! cleaner's job.

use std::path::Path;

use crate::domain::result::Result;
use crate::domain::SourceFormat;

/// A parsed table: header names plus data rows as optional cell strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    /// Data rows; an empty cell is `None`. Rows may be shorter than the header.
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Position of a header, compared case-insensitively after trimming
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    }
}

/// Reader for one tabular file format
pub trait TabularSource: Send + Sync {
    /// Format handled by this source
    fn format(&self) -> SourceFormat;

    /// Read the whole table. Fails with a load error if the file is missing
    /// or cannot be parsed as a table with a header row.
    fn read_table(&self, path: &Path) -> Result<RawTable>;
}
