mod m5;
mod maf;
mod sam;

pub use m5::M5Parser;
pub use maf::MafParser;
pub use sam::SamParser;

use crate::profile::record::{AlignmentRecord, EditKind, EditOp};
use crate::profile::refseq::ReferenceSource;
use crate::utils::open_alignment_reader;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug)]
pub enum ParseError {
    Io(std::io::Error),
    Format(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "IO error: {}", e),
            ParseError::Format(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::Io(e)
    }
}

/// Result of parsing one read's alignment file: the valid records plus a
/// reason for every record that had to be skipped. A skipped record is not
/// fatal; a file yielding zero valid records is reported as unaligned by the
/// caller.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub records: Vec<AlignmentRecord>,
    pub skipped: Vec<(usize, String)>,
}

impl ParseOutcome {
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

/// Parses one alignment-file format into records for a single read, given a
/// registry of references. Implementations must not touch shared mutable
/// state; the processor calls them concurrently from worker threads.
pub trait AlignmentParser: Sync {
    fn parse_records(
        &self,
        reader: &mut dyn BufRead,
        refs: &dyn ReferenceSource,
    ) -> Result<ParseOutcome, ParseError>;

    fn parse_file(
        &self,
        path: &Path,
        refs: &dyn ReferenceSource,
    ) -> Result<ParseOutcome, ParseError> {
        let mut reader = open_alignment_reader(path)?;
        self.parse_records(&mut reader, refs)
    }
}

/// Format tag mapping to a concrete parser implementation. Adding a format
/// means adding a variant here and a parser module; downstream code only
/// sees the `AlignmentParser` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentFormat {
    Maf,
    Sam,
    M5,
}

impl AlignmentFormat {
    pub fn parser(self) -> &'static (dyn AlignmentParser + Send + Sync) {
        match self {
            AlignmentFormat::Maf => &MafParser,
            AlignmentFormat::Sam => &SamParser,
            AlignmentFormat::M5 => &M5Parser,
        }
    }
}

impl fmt::Display for AlignmentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlignmentFormat::Maf => "maf",
            AlignmentFormat::Sam => "sam",
            AlignmentFormat::M5 => "m5",
        };
        f.write_str(name)
    }
}

impl FromStr for AlignmentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maf" => Ok(AlignmentFormat::Maf),
            "sam" => Ok(AlignmentFormat::Sam),
            "m5" => Ok(AlignmentFormat::M5),
            _ => Err(format!(
                "Unknown alignment format '{}' (expected maf, sam, or m5)",
                s
            )),
        }
    }
}

/// Derive edit operations and ungapped read bases from a pair of gapped
/// alignment rows (MAF and m5 both encode alignments this way).
pub(crate) fn ops_from_gapped_rows(
    ref_row: &[u8],
    read_row: &[u8],
) -> Result<(Vec<EditOp>, Vec<u8>), String> {
    if ref_row.len() != read_row.len() {
        return Err(format!(
            "Aligned rows differ in length ({} vs {})",
            ref_row.len(),
            read_row.len()
        ));
    }
    let mut ops: Vec<EditOp> = Vec::new();
    let mut read_bases = Vec::new();
    for (&ref_base, &read_base) in ref_row.iter().zip(read_row.iter()) {
        let kind = match (ref_base, read_base) {
            (b'-', b'-') => return Err("Gap aligned to gap".to_string()),
            (b'-', _) => EditKind::Insertion,
            (_, b'-') => EditKind::Deletion,
            (r, q) => {
                if r.eq_ignore_ascii_case(&q) {
                    EditKind::Match
                } else {
                    EditKind::Mismatch
                }
            }
        };
        if kind.consumes_read() {
            read_bases.push(read_base.to_ascii_uppercase());
        }
        match ops.last_mut() {
            Some(op) if op.kind == kind => op.len += 1,
            _ => ops.push(EditOp::new(kind, 1)),
        }
    }
    Ok((ops, read_bases))
}
