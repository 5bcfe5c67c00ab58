use super::{ops_from_gapped_rows, AlignmentParser, ParseError, ParseOutcome};
use crate::profile::record::{AlignmentRecord, Strand};
use crate::profile::refseq::ReferenceSource;
use std::io::BufRead;

/// Parser for LAST's MAF output: `a score=N` header followed by two gapped
/// `s` rows, reference first, read second. Query-strand `-` rows are already
/// reverse-complemented into reference orientation by the aligner; only the
/// read coordinates need converting back to original read coordinates.
pub struct MafParser;

struct MafRow<'a> {
    name: &'a str,
    start: usize,
    span: usize,
    strand: char,
    src_size: usize,
    text: &'a [u8],
}

fn parse_s_row(line: &str) -> Result<MafRow<'_>, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 7 {
        return Err(format!("Expected 7 fields in s line, found {}", fields.len()));
    }
    let start = fields[2]
        .parse::<usize>()
        .map_err(|e| format!("Invalid start: {}", e))?;
    let span = fields[3]
        .parse::<usize>()
        .map_err(|e| format!("Invalid size: {}", e))?;
    let strand = fields[4]
        .chars()
        .next()
        .filter(|c| *c == '+' || *c == '-')
        .ok_or_else(|| format!("Invalid strand '{}'", fields[4]))?;
    let src_size = fields[5]
        .parse::<usize>()
        .map_err(|e| format!("Invalid source size: {}", e))?;
    Ok(MafRow {
        name: fields[1],
        start,
        span,
        strand,
        src_size,
        text: fields[6].as_bytes(),
    })
}

fn parse_score(a_line: &str) -> Result<i64, String> {
    a_line
        .split_whitespace()
        .find_map(|token| token.strip_prefix("score="))
        .ok_or_else(|| "Missing score field in a line".to_string())?
        .parse::<i64>()
        .map_err(|e| format!("Invalid score: {}", e))
}

fn parse_block(a_line: &str, s_rows: &[(usize, String)]) -> Result<AlignmentRecord, String> {
    let score = parse_score(a_line)?;
    if s_rows.len() < 2 {
        return Err(format!(
            "Alignment block has {} s lines, expected 2",
            s_rows.len()
        ));
    }
    let ref_row = parse_s_row(&s_rows[0].1)?;
    let read_row = parse_s_row(&s_rows[1].1)?;

    if ref_row.strand != '+' {
        return Err("Reference row on reverse strand".to_string());
    }

    let (ops, read_bases) = ops_from_gapped_rows(ref_row.text, read_row.text)?;
    if read_bases.len() != read_row.span {
        return Err(format!(
            "Read row consumes {} bases but declares {}",
            read_bases.len(),
            read_row.span
        ));
    }
    let ref_consumed: usize = ops.iter().map(|op| op.ref_len()).sum();
    if ref_consumed != ref_row.span {
        return Err(format!(
            "Reference row consumes {} bases but declares {}",
            ref_consumed, ref_row.span
        ));
    }

    // A '-' read row reports its start in reverse-strand coordinates
    let (strand, read_start) = match read_row.strand {
        '+' => (Strand::Forward, read_row.start),
        _ => (
            Strand::Reverse,
            read_row.src_size - read_row.start - read_row.span,
        ),
    };

    Ok(AlignmentRecord {
        read_id: read_row.name.to_string(),
        read_len: read_row.src_size,
        read_start,
        read_span: read_row.span,
        ref_id: ref_row.name.to_string(),
        ref_start: ref_row.start,
        ref_span: ref_row.span,
        strand,
        score,
        ops,
        read_bases,
    })
}

impl AlignmentParser for MafParser {
    fn parse_records(
        &self,
        reader: &mut dyn BufRead,
        _refs: &dyn ReferenceSource,
    ) -> Result<ParseOutcome, ParseError> {
        let lines = reader
            .lines()
            .collect::<std::io::Result<Vec<String>>>()?;

        let mut outcome = ParseOutcome::default();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim_end();
            if !is_a_line(line) {
                i += 1;
                continue;
            }
            let block_line = i + 1;
            let mut s_rows = Vec::new();
            let mut j = i + 1;
            while j < lines.len() {
                let next = lines[j].trim_end();
                if next.is_empty() || is_a_line(next) {
                    break;
                }
                if next.starts_with("s ") {
                    s_rows.push((j + 1, next.to_string()));
                }
                j += 1;
            }
            match parse_block(line, &s_rows) {
                Ok(record) => outcome.records.push(record),
                Err(reason) => outcome.skipped.push((block_line, reason)),
            }
            i = j;
        }
        Ok(outcome)
    }
}

fn is_a_line(line: &str) -> bool {
    line == "a" || line.starts_with("a ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::record::{EditKind, EditOp};
    use crate::profile::refseq::MapReference;
    use std::io::Cursor;

    fn parse(content: &str) -> ParseOutcome {
        let refs = MapReference::new(&[]);
        MafParser
            .parse_records(&mut Cursor::new(content.to_string()), &refs)
            .unwrap()
    }

    #[test]
    fn test_parse_forward_block() {
        let content = "\
# last output
a score=27
s ref1 2 8 + 100 ACGT-ACGT
s read1 0 8 + 12 ACGTTACG-
";
        let outcome = parse(content);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.count(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.read_id, "read1");
        assert_eq!(record.ref_id, "ref1");
        assert_eq!(record.score, 27);
        assert_eq!(record.read_len, 12);
        assert_eq!((record.read_start, record.read_span), (0, 8));
        assert_eq!((record.ref_start, record.ref_span), (2, 8));
        assert_eq!(record.strand, Strand::Forward);
        assert_eq!(
            record.ops,
            vec![
                EditOp::new(EditKind::Match, 4),
                EditOp::new(EditKind::Insertion, 1),
                EditOp::new(EditKind::Match, 3),
                EditOp::new(EditKind::Deletion, 1),
            ]
        );
        assert_eq!(record.read_bases, b"ACGTTACG".to_vec());
    }

    #[test]
    fn test_parse_reverse_read_coordinates() {
        let content = "\
a score=14
s ref1 10 4 + 100 ACGT
s read2 1 4 - 20 ACGT
";
        let outcome = parse(content);
        let record = &outcome.records[0];
        assert_eq!(record.strand, Strand::Reverse);
        // 20 - 1 - 4: back to original read coordinates
        assert_eq!(record.read_start, 15);
    }

    #[test]
    fn test_malformed_block_is_skipped() {
        let content = "\
a score=bad
s ref1 2 4 + 100 ACGT
s read1 0 4 + 10 ACGT
a score=10
s ref1 2 4 + 100 ACGT
s read1 0 4 + 10 ACGT
";
        let outcome = parse(content);
        assert_eq!(outcome.count(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.records[0].score, 10);
    }

    #[test]
    fn test_span_mismatch_is_skipped() {
        let content = "\
a score=10
s ref1 2 5 + 100 ACGT
s read1 0 4 + 10 ACGT
";
        let outcome = parse(content);
        assert_eq!(outcome.count(), 0);
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[test]
    fn test_empty_file_yields_no_records() {
        let outcome = parse("# eof\n");
        assert_eq!(outcome.count(), 0);
        assert!(outcome.skipped.is_empty());
    }
}
