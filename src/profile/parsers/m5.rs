use super::{ops_from_gapped_rows, AlignmentParser, ParseError, ParseOutcome};
use crate::profile::record::{revcomp, AlignmentRecord, Strand};
use crate::profile::refseq::ReferenceSource;
use std::io::BufRead;

/// Parser for BLASR's m5 output: one whitespace-separated record per line
/// with gapped query and target rows. BLASR scores are lower-is-better and
/// are negated on parse. Records aligned to the reverse target strand are
/// normalized to forward reference orientation (coordinates flipped, rows
/// reverse-complemented).
pub struct M5Parser;

const M5_FIELD_COUNT: usize = 19;

fn parse_usize(field: &str, name: &str) -> Result<usize, String> {
    field
        .parse::<usize>()
        .map_err(|e| format!("Invalid {}: {}", name, e))
}

fn parse_line(line: &str) -> Result<AlignmentRecord, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != M5_FIELD_COUNT {
        return Err(format!(
            "Expected {} fields, found {}",
            M5_FIELD_COUNT,
            fields.len()
        ));
    }

    let read_id = fields[0];
    let read_len = parse_usize(fields[1], "query length")?;
    let q_start = parse_usize(fields[2], "query start")?;
    let q_end = parse_usize(fields[3], "query end")?;
    let q_strand = fields[4];
    let ref_id = fields[5];
    let t_len = parse_usize(fields[6], "target length")?;
    let t_start = parse_usize(fields[7], "target start")?;
    let t_end = parse_usize(fields[8], "target end")?;
    let t_strand = fields[9];
    let raw_score = fields[10]
        .parse::<i64>()
        .map_err(|e| format!("Invalid score: {}", e))?;
    let q_row = fields[16].as_bytes();
    let t_row = fields[18].as_bytes();

    if q_end < q_start || t_end < t_start || q_end > read_len || t_end > t_len {
        return Err("Inconsistent alignment coordinates".to_string());
    }

    let target_reverse = t_strand == "-";
    let (ref_start, q_row, t_row) = if target_reverse {
        (t_len - t_end, revcomp(q_row), revcomp(t_row))
    } else {
        (t_start, q_row.to_vec(), t_row.to_vec())
    };

    let (ops, read_bases) = ops_from_gapped_rows(&t_row, &q_row)?;
    let read_span = q_end - q_start;
    let ref_span = t_end - t_start;
    if read_bases.len() != read_span {
        return Err(format!(
            "Query row consumes {} bases but coordinates span {}",
            read_bases.len(),
            read_span
        ));
    }
    let ref_consumed: usize = ops.iter().map(|op| op.ref_len()).sum();
    if ref_consumed != ref_span {
        return Err(format!(
            "Target row consumes {} bases but coordinates span {}",
            ref_consumed, ref_span
        ));
    }

    let read_start = if q_strand == "-" {
        read_len - q_end
    } else {
        q_start
    };
    let strand = if (q_strand == "-") != target_reverse {
        Strand::Reverse
    } else {
        Strand::Forward
    };

    Ok(AlignmentRecord {
        read_id: read_id.to_string(),
        read_len,
        read_start,
        read_span,
        ref_id: ref_id.to_string(),
        ref_start,
        ref_span,
        strand,
        // BLASR scores improve downwards
        score: -raw_score,
        ops,
        read_bases,
    })
}

impl AlignmentParser for M5Parser {
    fn parse_records(
        &self,
        reader: &mut dyn BufRead,
        _refs: &dyn ReferenceSource,
    ) -> Result<ParseOutcome, ParseError> {
        let mut outcome = ParseOutcome::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Ok(record) => outcome.records.push(record),
                Err(reason) => outcome.skipped.push((index + 1, reason)),
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::record::{EditKind, EditOp};
    use crate::profile::refseq::MapReference;
    use std::io::Cursor;

    fn parse(content: &str) -> ParseOutcome {
        let refs = MapReference::new(&[]);
        M5Parser
            .parse_records(&mut Cursor::new(content.to_string()), &refs)
            .unwrap()
    }

    #[test]
    fn test_parse_forward_record() {
        let content =
            "read1 10 1 6 + ref1 8 2 7 + -20 4 1 0 0 254 CCGAT |||*| CCGGT\n";
        let outcome = parse(content);
        assert!(outcome.skipped.is_empty());
        let record = &outcome.records[0];
        assert_eq!(record.read_id, "read1");
        assert_eq!(record.ref_id, "ref1");
        // negated: -20 becomes 20
        assert_eq!(record.score, 20);
        assert_eq!((record.read_start, record.read_span), (1, 5));
        assert_eq!((record.ref_start, record.ref_span), (2, 5));
        assert_eq!(record.strand, Strand::Forward);
        assert_eq!(
            record.ops,
            vec![
                EditOp::new(EditKind::Match, 3),
                EditOp::new(EditKind::Mismatch, 1),
                EditOp::new(EditKind::Match, 1),
            ]
        );
        assert_eq!(record.read_bases, b"CCGAT".to_vec());
    }

    #[test]
    fn test_reverse_target_is_normalized() {
        let content = "read2 12 0 3 + ref1 8 2 5 - -15 3 0 0 0 254 CCG ||| CCG\n";
        let outcome = parse(content);
        let record = &outcome.records[0];
        assert_eq!(record.strand, Strand::Reverse);
        // flipped to forward coordinates: 8 - 5
        assert_eq!((record.ref_start, record.ref_span), (3, 3));
        assert_eq!(record.read_start, 0);
        assert_eq!(record.ops, vec![EditOp::new(EditKind::Match, 3)]);
        assert_eq!(record.read_bases, b"CGG".to_vec());
        assert_eq!(record.score, 15);
    }

    #[test]
    fn test_gapped_rows() {
        let content =
            "read3 10 0 5 + ref1 8 0 4 + -9 4 0 1 0 254 ACGTT ||||| ACG-T\n";
        let outcome = parse(content);
        let record = &outcome.records[0];
        assert_eq!(
            record.ops,
            vec![
                EditOp::new(EditKind::Match, 3),
                EditOp::new(EditKind::Insertion, 1),
                EditOp::new(EditKind::Match, 1),
            ]
        );
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let content = "\
read4 10 0 5 + ref1 8 0 5\n\
read5 10 0 4 + ref1 8 0 4 + -8 4 0 0 0 254 ACGT |||| ACGT\n";
        let outcome = parse(content);
        assert_eq!(outcome.count(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.records[0].read_id, "read5");
    }

    #[test]
    fn test_coordinate_span_mismatch_is_skipped() {
        let content = "read6 10 0 5 + ref1 8 0 4 + -8 4 0 0 0 254 ACGT |||| ACGT\n";
        let outcome = parse(content);
        assert_eq!(outcome.count(), 0);
        assert_eq!(outcome.skipped.len(), 1);
    }
}
