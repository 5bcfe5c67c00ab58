use super::{AlignmentParser, ParseError, ParseOutcome};
use crate::profile::record::{AlignmentRecord, EditKind, EditOp, Strand};
use crate::profile::refseq::ReferenceSource;
use std::io::BufRead;

/// Parser for SAM output (BWA-MEM, marginAlign). `M` runs carry no
/// match/mismatch information, so they are split against the reference
/// registry; `=`/`X` runs are taken as-is. The score is the `AS:i:` tag,
/// falling back to the aligned read-span length when the aligner did not
/// emit one.
pub struct SamParser;

const FLAG_UNMAPPED: u16 = 0x4;
const FLAG_REVERSE: u16 = 0x10;

#[derive(Debug, Clone, Copy)]
struct CigarItem {
    len: u32,
    op: u8,
}

fn parse_cigar(cigar: &str) -> Result<Vec<CigarItem>, String> {
    let mut items = Vec::new();
    let mut len: u32 = 0;
    for c in cigar.bytes() {
        if c.is_ascii_digit() {
            len = len
                .checked_mul(10)
                .and_then(|v| v.checked_add((c - b'0') as u32))
                .ok_or("CIGAR length overflow")?;
        } else {
            if len == 0 {
                return Err(format!("Zero-length CIGAR operation '{}'", c as char));
            }
            match c {
                b'M' | b'=' | b'X' | b'I' | b'D' | b'S' | b'H' => {
                    items.push(CigarItem { len, op: c })
                }
                b'N' | b'P' => return Err(format!("Unsupported CIGAR operation '{}'", c as char)),
                _ => return Err(format!("Invalid CIGAR character '{}'", c as char)),
            }
            len = 0;
        }
    }
    if len != 0 {
        return Err("CIGAR ends with a dangling length".to_string());
    }
    if items.is_empty() {
        return Err("Empty CIGAR".to_string());
    }
    Ok(items)
}

fn alignment_score(fields: &[&str]) -> Option<i64> {
    fields.iter().skip(11).find_map(|tag| {
        tag.strip_prefix("AS:i:")
            .and_then(|value| value.parse::<i64>().ok())
    })
}

/// Split one `M` run into match/mismatch ops by comparing read bases with
/// the reference segment.
fn push_m_run(ops: &mut Vec<EditOp>, read: &[u8], reference: &[u8]) {
    for (&read_base, &ref_base) in read.iter().zip(reference.iter()) {
        let kind = if read_base.eq_ignore_ascii_case(&ref_base) {
            EditKind::Match
        } else {
            EditKind::Mismatch
        };
        match ops.last_mut() {
            Some(op) if op.kind == kind => op.len += 1,
            _ => ops.push(EditOp::new(kind, 1)),
        }
    }
}

fn push_op(ops: &mut Vec<EditOp>, kind: EditKind, len: u32) {
    match ops.last_mut() {
        Some(op) if op.kind == kind => op.len += len,
        _ => ops.push(EditOp::new(kind, len)),
    }
}

fn parse_line(line: &str, refs: &dyn ReferenceSource) -> Result<Option<AlignmentRecord>, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 11 {
        return Err(format!("Expected at least 11 fields, found {}", fields.len()));
    }
    let flag = fields[1]
        .parse::<u16>()
        .map_err(|e| format!("Invalid flag: {}", e))?;
    if flag & FLAG_UNMAPPED != 0 || fields[2] == "*" {
        return Ok(None);
    }

    let ref_id = fields[2];
    let pos = fields[3]
        .parse::<usize>()
        .map_err(|e| format!("Invalid position: {}", e))?;
    if pos == 0 {
        return Err("Mapped record with zero position".to_string());
    }
    let ref_start = pos - 1;
    let cigar = parse_cigar(fields[5])?;
    let seq = fields[9];
    if seq == "*" {
        return Err("Mapped record without sequence".to_string());
    }
    let seq = seq.as_bytes();

    // Clip structure: clips may only flank the alignment
    let mut leading_soft = 0usize;
    let mut leading_hard = 0usize;
    let mut trailing_soft = 0usize;
    let mut trailing_hard = 0usize;
    let mut core = &cigar[..];
    while let Some((first, rest)) = core.split_first() {
        match first.op {
            b'H' => leading_hard += first.len as usize,
            b'S' => leading_soft += first.len as usize,
            _ => break,
        }
        core = rest;
    }
    while let Some((last, rest)) = core.split_last() {
        match last.op {
            b'H' => trailing_hard += last.len as usize,
            b'S' => trailing_soft += last.len as usize,
            _ => break,
        }
        core = rest;
    }
    if core.iter().any(|item| item.op == b'S' || item.op == b'H') {
        return Err("Clipping inside the aligned region".to_string());
    }

    let read_span: usize = core
        .iter()
        .filter(|item| matches!(item.op, b'M' | b'=' | b'X' | b'I'))
        .map(|item| item.len as usize)
        .sum();
    let ref_span: usize = core
        .iter()
        .filter(|item| matches!(item.op, b'M' | b'=' | b'X' | b'D'))
        .map(|item| item.len as usize)
        .sum();
    if read_span == 0 {
        return Err("Alignment consumes no read bases".to_string());
    }
    if seq.len() != leading_soft + read_span + trailing_soft {
        return Err(format!(
            "Sequence length {} does not match CIGAR ({} bases)",
            seq.len(),
            leading_soft + read_span + trailing_soft
        ));
    }
    let read_bases = seq[leading_soft..leading_soft + read_span].to_ascii_uppercase();
    let read_len = seq.len() + leading_hard + trailing_hard;

    // Fetch the reference segment once if any M run needs splitting
    let ref_segment = if core.iter().any(|item| item.op == b'M') {
        Some(refs.fetch(ref_id, ref_start, ref_start + ref_span)?)
    } else {
        None
    };

    let mut ops = Vec::new();
    let mut read_cursor = 0usize;
    let mut ref_cursor = 0usize;
    for item in core {
        let len = item.len as usize;
        match item.op {
            b'M' => {
                let reference = ref_segment.as_ref().unwrap();
                push_m_run(
                    &mut ops,
                    &read_bases[read_cursor..read_cursor + len],
                    &reference[ref_cursor..ref_cursor + len],
                );
                read_cursor += len;
                ref_cursor += len;
            }
            b'=' => {
                push_op(&mut ops, EditKind::Match, item.len);
                read_cursor += len;
                ref_cursor += len;
            }
            b'X' => {
                push_op(&mut ops, EditKind::Mismatch, item.len);
                read_cursor += len;
                ref_cursor += len;
            }
            b'I' => {
                push_op(&mut ops, EditKind::Insertion, item.len);
                read_cursor += len;
            }
            b'D' => {
                push_op(&mut ops, EditKind::Deletion, item.len);
                ref_cursor += len;
            }
            _ => unreachable!(),
        }
    }

    // SEQ is stored in reference orientation; a reverse-strand record's
    // leading clip belongs to the end of the original read
    let (strand, read_start) = if flag & FLAG_REVERSE != 0 {
        (Strand::Reverse, trailing_soft + trailing_hard)
    } else {
        (Strand::Forward, leading_soft + leading_hard)
    };

    let score = alignment_score(&fields).unwrap_or(read_span as i64);

    Ok(Some(AlignmentRecord {
        read_id: fields[0].to_string(),
        read_len,
        read_start,
        read_span,
        ref_id: ref_id.to_string(),
        ref_start,
        ref_span,
        strand,
        score,
        ops,
        read_bases,
    }))
}

impl AlignmentParser for SamParser {
    fn parse_records(
        &self,
        reader: &mut dyn BufRead,
        refs: &dyn ReferenceSource,
    ) -> Result<ParseOutcome, ParseError> {
        let mut outcome = ParseOutcome::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('@') {
                continue;
            }
            match parse_line(line, refs) {
                Ok(Some(record)) => outcome.records.push(record),
                Ok(None) => {}
                Err(reason) => outcome.skipped.push((index + 1, reason)),
            }
        }
        Ok(outcome)
    }
}
