use crate::profile::read_type::ReadType;
use crate::profile::stats::{ReadDelta, ReferenceStatistics};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Snapshot schema version. Bumped whenever the encoded layout of
/// `OverallStats` changes; `load` refuses a mismatched version instead of
/// silently misreading fields.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadLengthSummary {
    pub count: u64,
    pub total_bases: u64,
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl ReadLengthSummary {
    pub fn add(&mut self, read_len: usize) {
        let len = read_len as u64;
        self.count += 1;
        self.total_bases += len;
        self.min = Some(self.min.map_or(len, |min| min.min(len)));
        self.max = Some(self.max.map_or(len, |max| max.max(len)));
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_bases as f64 / self.count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    Duplicate,
}

/// All statistics for one read type: the per-reference map, the seen-read
/// set backing the duplicate filter, and phase-level counters. One instance
/// per phase sits behind the phase mutex; the duplicate check and the
/// statistics update happen under the same exclusive access so the two
/// cannot race.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeStats {
    pub n_reads: u64,
    pub n_reads_aligned: u64,
    pub refs: BTreeMap<String, ReferenceStatistics>,
    pub seen: HashSet<String>,
    pub ignored_duplicates: u64,
    pub read_lengths: ReadLengthSummary,
}

impl TypeStats {
    /// Account for a read that produced no usable alignment.
    pub fn register_unaligned(&mut self) {
        self.n_reads += 1;
    }

    /// Atomically test-and-insert the read id, then commit the whole read
    /// delta or none of it. A duplicate is an expected anomaly: counted,
    /// skipped, never an error.
    pub fn commit_read(&mut self, delta: &ReadDelta, ref_len: usize) -> CommitOutcome {
        self.n_reads += 1;
        if !self.seen.insert(delta.read_id.clone()) {
            self.ignored_duplicates += 1;
            return CommitOutcome::Duplicate;
        }
        self.n_reads_aligned += 1;
        self.read_lengths.add(delta.read_len);
        self.refs
            .entry(delta.ref_id.clone())
            .or_insert_with(|| ReferenceStatistics::new(ref_len))
            .commit(delta);
        CommitOutcome::Committed
    }
}

/// Exclusive owner of every per-(reference, read type) statistic. Filled in
/// one phase at a time; read-only for report collaborators afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub by_type: BTreeMap<ReadType, TypeStats>,
}

impl OverallStats {
    pub fn new() -> Self {
        OverallStats::default()
    }

    pub fn insert(&mut self, read_type: ReadType, stats: TypeStats) {
        self.by_type.insert(read_type, stats);
    }

    pub fn get(&self, read_type: ReadType) -> Option<&TypeStats> {
        self.by_type.get(&read_type)
    }

    pub fn save(&self, path: &Path) -> crate::utils::Result<()> {
        let file = File::create(path)
            .map_err(|e| format!("Failed to create snapshot {}: {}", path.display(), e))?;
        let mut writer = BufWriter::new(file);
        let config = bincode::config::standard();
        bincode::serde::encode_into_std_write(SNAPSHOT_VERSION, &mut writer, config)
            .map_err(|e| format!("Failed to write snapshot header: {}", e))?;
        bincode::serde::encode_into_std_write(self, &mut writer, config)
            .map_err(|e| format!("Failed to write snapshot: {}", e))?;
        Ok(())
    }

    pub fn load(path: &Path) -> crate::utils::Result<Self> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open snapshot {}: {}", path.display(), e))?;
        let mut reader = BufReader::new(file);
        let config = bincode::config::standard();
        let version: u32 = bincode::serde::decode_from_std_read(&mut reader, config)
            .map_err(|e| format!("Failed to read snapshot header: {}", e))?;
        if version != SNAPSHOT_VERSION {
            return Err(format!(
                "Snapshot {} has schema version {}, expected {}",
                path.display(),
                version,
                SNAPSHOT_VERSION
            ));
        }
        bincode::serde::decode_from_std_read(&mut reader, config)
            .map_err(|e| format!("Failed to decode snapshot {}: {}", path.display(), e))
    }
}
