//! NCBI taxonomy `nodes.dmp` parser
//!
//! # File Format
//! One record per line, fields separated by `\t|\t`, lines ending with `\t|`:
//!
//! ```text
//! tax_id | parent tax_id | rank | embl code | division id | ...
//! 9606   | 9605          | species | HS | 5 | ...
//! ```
//!
//! Only the first two fields are read. Parsing is fail-fast: one malformed
//! record aborts the whole file so a truncated hierarchy is never queried.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TaxonomyError};
use crate::index::{TaxonId, TaxonomyIndex, TaxonomyIndexBuilder};

/// Parser for taxonomy hierarchy record files
#[derive(Debug, Clone)]
pub struct TaxdumpParser {
    delimiter: char,
}

impl TaxdumpParser {
    /// Parser for the NCBI `|`-delimited layout
    pub fn new() -> Self {
        Self { delimiter: '|' }
    }

    /// Parser for another single-character delimiter (e.g. `\t`)
    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Parse a nodes file into an index
    pub fn parse(&self, nodes_path: impl AsRef<Path>) -> Result<TaxonomyIndex> {
        let nodes_path = nodes_path.as_ref();
        let file = File::open(nodes_path).map_err(|e| {
            TaxonomyError::parse(0, format!("cannot open {}: {}", nodes_path.display(), e))
        })?;
        let capacity = file
            .metadata()
            .map(|m| (m.len() / 64) as usize)
            .unwrap_or_default();

        debug!("Parsing {}", nodes_path.display());
        self.parse_reader_with_capacity(BufReader::new(file), capacity)
    }

    /// Parse records from any buffered reader
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<TaxonomyIndex> {
        self.parse_reader_with_capacity(reader, 0)
    }

    fn parse_reader_with_capacity<R: BufRead>(
        &self,
        reader: R,
        capacity: usize,
    ) -> Result<TaxonomyIndex> {
        let mut builder = TaxonomyIndexBuilder::with_capacity(capacity);

        for (offset, line) in reader.lines().enumerate() {
            let line_num = offset + 1;
            let line = line.map_err(|e| TaxonomyError::parse(line_num, format!("read failed: {}", e)))?;

            if line.trim().is_empty() {
                continue;
            }

            let (id, parent) = self.parse_line(&line, line_num)?;
            builder.insert(id, parent, line_num)?;
        }

        debug!("Parsed {} taxa", builder.len());
        Ok(builder.build())
    }

    /// Parse the `(tax_id, parent tax_id)` pair of a single record
    pub fn parse_line(&self, line: &str, line_num: usize) -> Result<(TaxonId, TaxonId)> {
        let mut fields = line.split(self.delimiter).map(str::trim);

        let id = Self::parse_id(fields.next(), "tax_id", line_num)?;
        let parent = Self::parse_id(fields.next(), "parent tax_id", line_num)?;

        Ok((id, parent))
    }

    fn parse_id(field: Option<&str>, name: &str, line_num: usize) -> Result<TaxonId> {
        let raw = match field {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(TaxonomyError::parse(line_num, format!("missing {}", name))),
        };

        match raw.parse::<TaxonId>() {
            Ok(0) => Err(TaxonomyError::parse(line_num, format!("{} must be positive", name))),
            Ok(id) => Ok(id),
            Err(_) => Err(TaxonomyError::parse(line_num, format!("invalid {}: '{}'", name, raw))),
        }
    }
}

impl Default for TaxdumpParser {
    fn default() -> Self {
        Self::new()
    }
}
