use crate::profile::record::AlignmentRecord;
use itertools::Itertools;
use std::cmp::Ordering;

/// All alignment records parsed for one read. Transient: sorted on
/// construction, discarded once the winning subset is extracted.
#[derive(Debug)]
pub struct ReadAlignmentSet {
    records: Vec<AlignmentRecord>,
}

impl ReadAlignmentSet {
    pub fn new(records: Vec<AlignmentRecord>) -> Self {
        let mut set = ReadAlignmentSet { records };
        set.sort_alignments();
        set
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[AlignmentRecord] {
        &self.records
    }

    /// Deterministic total order: score descending, read-span length
    /// descending, reference start ascending, reference id ascending.
    /// Selection must be reproducible across runs and worker counts.
    pub fn sort_alignments(&mut self) {
        self.records.sort_by(compare_records);
    }

    /// All records belonging to the reference with the greatest summed
    /// score, in sorted order. A read split across several segments to one
    /// reference beats a single lower-aggregate alignment elsewhere. Equal
    /// sums tie-break on the lexicographically smallest reference id.
    pub fn highest_scoring_set(self) -> Option<Vec<AlignmentRecord>> {
        let totals = self
            .records
            .iter()
            .map(|record| (record.ref_id.clone(), record.score))
            .into_group_map()
            .into_iter()
            .map(|(ref_id, scores)| (ref_id, scores.iter().sum::<i64>()))
            .collect_vec();

        let (winner, _) = totals.into_iter().max_by(|a, b| {
            a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0))
        })?;

        Some(
            self.records
                .into_iter()
                .filter(|record| record.ref_id == winner)
                .collect(),
        )
    }
}

fn compare_records(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.read_span.cmp(&a.read_span))
        .then_with(|| a.ref_start.cmp(&b.ref_start))
        .then_with(|| a.ref_id.cmp(&b.ref_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::record::{EditKind, EditOp, Strand};

    fn record(read_id: &str, ref_id: &str, score: i64, span: usize) -> AlignmentRecord {
        AlignmentRecord {
            read_id: read_id.to_string(),
            read_len: 100,
            read_start: 0,
            read_span: span,
            ref_id: ref_id.to_string(),
            ref_start: 0,
            ref_span: span,
            strand: Strand::Forward,
            score,
            ops: vec![EditOp::new(EditKind::Match, span as u32)],
            read_bases: vec![b'A'; span],
        }
    }

    #[test]
    fn test_sort_order() {
        let mut set = ReadAlignmentSet::new(vec![
            record("r", "refB", 40, 10),
            record("r", "refA", 50, 10),
            record("r", "refA", 40, 20),
        ]);
        set.sort_alignments();
        let scores: Vec<(i64, usize)> = set
            .records()
            .iter()
            .map(|r| (r.score, r.read_span))
            .collect();
        assert_eq!(scores, vec![(50, 10), (40, 20), (40, 10)]);
    }

    #[test]
    fn test_aggregate_score_beats_single_best() {
        let set = ReadAlignmentSet::new(vec![
            record("r", "refA", 50, 10),
            record("r", "refB", 45, 10),
            record("r", "refA", 40, 10),
            record("r", "refB", 45, 10),
            record("r", "refA", 30, 10),
        ]);
        // sum(refA) = 120 beats sum(refB) = 90
        let winning = set.highest_scoring_set().unwrap();
        assert_eq!(winning.len(), 3);
        assert!(winning.iter().all(|r| r.ref_id == "refA"));
        let scores: Vec<i64> = winning.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![50, 40, 30]);
    }

    #[test]
    fn test_split_alignments_beat_longer_single() {
        let set = ReadAlignmentSet::new(vec![
            record("r", "refB", 60, 50),
            record("r", "refA", 35, 20),
            record("r", "refA", 35, 20),
        ]);
        let winning = set.highest_scoring_set().unwrap();
        assert!(winning.iter().all(|r| r.ref_id == "refA"));
    }

    #[test]
    fn test_equal_sum_tie_breaks_on_reference_id() {
        let set = ReadAlignmentSet::new(vec![
            record("r", "beta", 50, 10),
            record("r", "beta", 40, 10),
            record("r", "alpha", 90, 10),
        ]);
        let winning = set.highest_scoring_set().unwrap();
        assert!(winning.iter().all(|r| r.ref_id == "alpha"));
    }

    #[test]
    fn test_empty_set() {
        let set = ReadAlignmentSet::new(Vec::new());
        assert!(set.is_empty());
        assert!(set.highest_scoring_set().is_none());
    }
}
