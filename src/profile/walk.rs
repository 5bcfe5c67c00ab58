use crate::profile::parsers::ParseError;
use crate::profile::record::{AlignmentRecord, EditKind};
use crate::profile::refseq::ReferenceSource;
use crate::profile::stats::ReadDelta;

/// Expand one record's edit operations into per-base classifications over
/// two synchronized cursors (read position, reference position).
///
/// The closure invariant is enforced up front: a record whose operation
/// lengths do not sum to its declared spans is corrupt and contributes zero
/// counts. This keeps a bad record from silently misattributing statistics
/// partway through the walk.
pub fn walk_record(
    record: &AlignmentRecord,
    refs: &dyn ReferenceSource,
    kmer_len: usize,
) -> Result<ReadDelta, ParseError> {
    let op_read_len = record.op_read_len();
    if op_read_len != record.read_span {
        return Err(ParseError::Format(format!(
            "{}: operations consume {} read bases but record spans {}",
            record.read_id, op_read_len, record.read_span
        )));
    }
    let op_ref_len = record.op_ref_len();
    if op_ref_len != record.ref_span {
        return Err(ParseError::Format(format!(
            "{}: operations consume {} reference bases but record spans {}",
            record.read_id, op_ref_len, record.ref_span
        )));
    }
    if record.read_bases.len() != record.read_span {
        return Err(ParseError::Format(format!(
            "{}: record stores {} read bases but spans {}",
            record.read_id,
            record.read_bases.len(),
            record.read_span
        )));
    }

    let ref_len = refs.sequence_length(&record.ref_id).ok_or_else(|| {
        ParseError::Format(format!("Unknown reference '{}'", record.ref_id))
    })?;
    if record.ref_start + record.ref_span > ref_len {
        return Err(ParseError::Format(format!(
            "{}: alignment {}..{} exceeds reference '{}' (length {})",
            record.read_id,
            record.ref_start,
            record.ref_start + record.ref_span,
            record.ref_id,
            ref_len
        )));
    }

    // One padded fetch covers every k-mer window the walk can ask for
    let flank = kmer_len / 2;
    let seg_start = record.ref_start.saturating_sub(flank);
    let seg_end = (record.ref_start + record.ref_span + flank).min(ref_len);
    let segment = if record.ref_span > 0 {
        refs.fetch(&record.ref_id, seg_start, seg_end)
            .map_err(ParseError::Format)?
    } else {
        Vec::new()
    };

    // Windows overhanging either reference end are skipped, keeping every
    // table key at uniform length
    let window_at = |center: usize| -> Option<String> {
        if center < flank || center + kmer_len - flank > ref_len {
            return None;
        }
        let lo = center - flank - seg_start;
        segment
            .get(lo..lo + kmer_len)
            .map(|window| String::from_utf8_lossy(window).into_owned())
    };

    let mut delta = ReadDelta::new(&record.read_id, &record.ref_id, record.read_len);
    delta.aligned_bases = record.read_span as u64;

    let mut read_cursor = 0usize;
    let mut ref_cursor = record.ref_start;
    for op in &record.ops {
        let len = op.len as usize;
        match op.kind {
            EditKind::Match => {
                delta.matches += op.len as u64;
                read_cursor += len;
                ref_cursor += len;
            }
            EditKind::Mismatch => {
                delta.mismatches += op.len as u64;
                for _ in 0..len {
                    let ref_base = segment[ref_cursor - seg_start];
                    let read_base = record.read_bases[read_cursor];
                    delta.error_positions.push(ref_cursor);
                    delta.substitutions.push((ref_base, read_base));
                    if let Some(window) = window_at(ref_cursor) {
                        delta.sub_kmers.push(window);
                    }
                    read_cursor += 1;
                    ref_cursor += 1;
                }
            }
            EditKind::Insertion => {
                delta.insertions += op.len as u64;
                // inserted bases have no reference position; key the context
                // table once per insertion on the surrounding cursor value
                if let Some(window) = window_at(ref_cursor) {
                    delta.ins_kmers.push(window);
                }
                read_cursor += len;
            }
            EditKind::Deletion => {
                delta.deletions += op.len as u64;
                for _ in 0..len {
                    delta.error_positions.push(ref_cursor);
                    if let Some(window) = window_at(ref_cursor) {
                        delta.del_kmers.push(window);
                    }
                    ref_cursor += 1;
                }
            }
        }
    }

    debug_assert_eq!(read_cursor, record.read_span);
    debug_assert_eq!(ref_cursor - record.ref_start, record.ref_span);

    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::record::{EditOp, Strand};
    use crate::profile::refseq::MapReference;

    const KMER_LEN: usize = 5;

    fn refs() -> MapReference {
        //                     0123456789012345
        MapReference::new(&[("ref1", "AACCGGTTAACCGGTT")])
    }

    fn record(
        ref_start: usize,
        ref_span: usize,
        read_span: usize,
        ops: Vec<EditOp>,
        read_bases: &[u8],
    ) -> AlignmentRecord {
        AlignmentRecord {
            read_id: "read1".to_string(),
            read_len: 30,
            read_start: 0,
            read_span,
            ref_id: "ref1".to_string(),
            ref_start,
            ref_span,
            strand: Strand::Forward,
            score: 10,
            ops,
            read_bases: read_bases.to_vec(),
        }
    }

    #[test]
    fn test_perfect_match() {
        let record = record(
            2,
            8,
            8,
            vec![EditOp::new(EditKind::Match, 8)],
            b"CCGGTTAA",
        );
        let delta = walk_record(&record, &refs(), KMER_LEN).unwrap();
        assert_eq!(delta.matches, 8);
        assert_eq!(delta.total_errors(), 0);
        assert_eq!(delta.aligned_bases, 8);
        assert!(delta.error_positions.is_empty());
    }

    #[test]
    fn test_mismatch_classification() {
        let ops = vec![
            EditOp::new(EditKind::Match, 3),
            EditOp::new(EditKind::Mismatch, 1),
            EditOp::new(EditKind::Match, 2),
        ];
        // ref1[2..8] = CCGGTT, read has A at reference position 5
        let record = record(2, 6, 6, ops, b"CCGATT");
        let delta = walk_record(&record, &refs(), KMER_LEN).unwrap();
        assert_eq!(delta.matches, 5);
        assert_eq!(delta.mismatches, 1);
        assert_eq!(delta.error_positions, vec![5]);
        assert_eq!(delta.substitutions, vec![(b'G', b'A')]);
        // window centered on reference position 5
        assert_eq!(delta.sub_kmers, vec!["CGGTT".to_string()]);
    }

    #[test]
    fn test_insertion_has_no_reference_position() {
        let ops = vec![
            EditOp::new(EditKind::Match, 3),
            EditOp::new(EditKind::Insertion, 2),
            EditOp::new(EditKind::Match, 3),
        ];
        let record = record(2, 6, 8, ops, b"CCGAAGTT");
        let delta = walk_record(&record, &refs(), KMER_LEN).unwrap();
        assert_eq!(delta.insertions, 2);
        assert!(delta.error_positions.is_empty());
        // keyed once per insertion event, centered on the reference cursor
        assert_eq!(delta.ins_kmers, vec!["CGGTT".to_string()]);
    }

    #[test]
    fn test_deletion_records_every_base() {
        let ops = vec![
            EditOp::new(EditKind::Match, 2),
            EditOp::new(EditKind::Deletion, 2),
            EditOp::new(EditKind::Match, 2),
        ];
        let record = record(2, 6, 4, ops, b"CCTT");
        let delta = walk_record(&record, &refs(), KMER_LEN).unwrap();
        assert_eq!(delta.deletions, 2);
        assert_eq!(delta.error_positions, vec![4, 5]);
        assert_eq!(
            delta.del_kmers,
            vec!["CCGGT".to_string(), "CGGTT".to_string()]
        );
    }

    #[test]
    fn test_window_skipped_at_reference_edge() {
        let ops = vec![
            EditOp::new(EditKind::Mismatch, 1),
            EditOp::new(EditKind::Match, 3),
        ];
        // error at reference position 0: no centered window exists
        let record = record(0, 4, 4, ops, b"TACC");
        let delta = walk_record(&record, &refs(), KMER_LEN).unwrap();
        assert_eq!(delta.mismatches, 1);
        assert!(delta.sub_kmers.is_empty());
    }

    #[test]
    fn test_read_span_mismatch_fails() {
        let ops = vec![EditOp::new(EditKind::Match, 5)];
        let record = record(2, 5, 6, ops, b"CCGGTT");
        let err = walk_record(&record, &refs(), KMER_LEN).unwrap_err();
        assert!(matches!(err, ParseError::Format(_)));
    }

    #[test]
    fn test_ref_span_mismatch_fails() {
        let ops = vec![EditOp::new(EditKind::Match, 5)];
        let record = record(2, 6, 5, ops, b"CCGGT");
        assert!(walk_record(&record, &refs(), KMER_LEN).is_err());
    }

    #[test]
    fn test_alignment_past_reference_end_fails() {
        let ops = vec![EditOp::new(EditKind::Match, 4)];
        let record = record(14, 4, 4, ops, b"TTAA");
        assert!(walk_record(&record, &refs(), KMER_LEN).is_err());
    }
}
