use crate::utils::{open_genome_reader, Result};
use rust_htslib::faidx;
use std::collections::HashMap;
use std::path::Path;

/// Sequence lookup by reference identifier.
///
/// The walker and the SAM parser read reference bases through this trait;
/// production code uses the faidx-backed registry, tests an in-memory map.
pub trait ReferenceSource {
    fn sequence_length(&self, ref_id: &str) -> Option<usize>;

    /// Fetch `[start, end)` of a reference sequence, uppercased.
    fn fetch(&self, ref_id: &str, start: usize, end: usize) -> Result<Vec<u8>>;
}

/// Faidx-backed reference registry with an eagerly built name -> length map.
///
/// `faidx::Reader` is not Sync, so each worker thread owns its own registry.
pub struct ReferenceRegistry {
    reader: faidx::Reader,
    lengths: HashMap<String, usize>,
}

impl ReferenceRegistry {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_genome_reader(path)?;
        let num_seqs = reader.n_seqs() as usize;
        let mut lengths = HashMap::with_capacity(num_seqs);
        for i in 0..num_seqs {
            let name = reader.seq_name(i as i32).map_err(|e| e.to_string())?;
            let len = reader.fetch_seq_len(&name);
            let len = usize::try_from(len)
                .map_err(|_| format!("Invalid length for reference '{}'", name))?;
            lengths.insert(name, len);
        }
        Ok(ReferenceRegistry { reader, lengths })
    }

    pub fn reference_ids(&self) -> impl Iterator<Item = &String> {
        self.lengths.keys()
    }
}

impl ReferenceSource for ReferenceRegistry {
    fn sequence_length(&self, ref_id: &str) -> Option<usize> {
        self.lengths.get(ref_id).copied()
    }

    fn fetch(&self, ref_id: &str, start: usize, end: usize) -> Result<Vec<u8>> {
        let len = self
            .sequence_length(ref_id)
            .ok_or_else(|| format!("Unknown reference '{}'", ref_id))?;
        if start >= end || end > len {
            return Err(format!(
                "Range {}..{} out of bounds for reference '{}' (length {})",
                start, end, ref_id, len
            ));
        }
        // faidx ranges are inclusive of the end coordinate
        let seq = self
            .reader
            .fetch_seq_string(ref_id, start, end - 1)
            .map_err(|e| format!("Error fetching {}:{}-{}: {}", ref_id, start, end, e))?;
        Ok(seq.to_uppercase().into_bytes())
    }
}

/// In-memory reference source for unit tests.
#[cfg(test)]
pub struct MapReference {
    sequences: HashMap<String, Vec<u8>>,
}

#[cfg(test)]
impl MapReference {
    pub fn new(sequences: &[(&str, &str)]) -> Self {
        MapReference {
            sequences: sequences
                .iter()
                .map(|(name, seq)| (name.to_string(), seq.as_bytes().to_vec()))
                .collect(),
        }
    }
}

#[cfg(test)]
impl ReferenceSource for MapReference {
    fn sequence_length(&self, ref_id: &str) -> Option<usize> {
        self.sequences.get(ref_id).map(Vec::len)
    }

    fn fetch(&self, ref_id: &str, start: usize, end: usize) -> Result<Vec<u8>> {
        let seq = self
            .sequences
            .get(ref_id)
            .ok_or_else(|| format!("Unknown reference '{}'", ref_id))?;
        if start >= end || end > seq.len() {
            return Err(format!(
                "Range {}..{} out of bounds for reference '{}' (length {})",
                start,
                end,
                ref_id,
                seq.len()
            ));
        }
        Ok(seq[start..end].to_ascii_uppercase())
    }
}
