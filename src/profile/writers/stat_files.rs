use crate::profile::overall::{OverallStats, TypeStats};
use crate::profile::read_type::ReadType;
use crate::profile::record::BASES;
use crate::profile::stats::ReferenceStatistics;
use crate::utils::Result;
use std::fs::File;
use std::io::{BufWriter, Write};

fn open(path: &str) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| format!("Failed to create {}: {}", path, e))?;
    Ok(BufWriter::new(file))
}

fn finish(mut writer: BufWriter<File>, path: &str) -> Result<()> {
    writer
        .flush()
        .map_err(|e| format!("Failed to write {}: {}", path, e))
}

/// Reference ids can contain characters that are unsafe in file names.
fn safe_ref_id(ref_id: &str) -> String {
    ref_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// One row per reference with the phase counters and overall identity.
pub fn write_type_summary(output_prefix: &str, read_type: ReadType, stats: &TypeStats) -> Result<()> {
    let path = format!("{}.{}.summary.tsv", output_prefix, read_type);
    let mut writer = open(&path)?;
    writeln!(
        writer,
        "reference\treads_aligned\taligned_bases\tmatches\tmismatches\tinsertions\tdeletions\tidentity"
    )
    .map_err(|e| format!("Failed to write {}: {}", path, e))?;
    for (ref_id, ref_stats) in &stats.refs {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.4}",
            ref_id,
            ref_stats.reads_aligned,
            ref_stats.aligned_bases,
            ref_stats.matches,
            ref_stats.mismatches,
            ref_stats.insertions,
            ref_stats.deletions,
            ref_stats.identity()
        )
        .map_err(|e| format!("Failed to write {}: {}", path, e))?;
    }
    finish(writer, &path)
}

fn write_error_histogram(path: &str, ref_stats: &ReferenceStatistics) -> Result<()> {
    let mut writer = open(path)?;
    writeln!(writer, "position\terrors").map_err(|e| format!("Failed to write {}: {}", path, e))?;
    for (pos, &count) in ref_stats.error_histogram.iter().enumerate() {
        if count == 0 {
            continue;
        }
        writeln!(writer, "{}\t{}", pos + 1, count)
            .map_err(|e| format!("Failed to write {}: {}", path, e))?;
    }
    finish(writer, path)
}

fn write_substitutions(path: &str, ref_stats: &ReferenceStatistics) -> Result<()> {
    let mut writer = open(path)?;
    let header: Vec<String> = BASES.iter().map(|&b| (b as char).to_string()).collect();
    writeln!(writer, "ref_base\t{}", header.join("\t"))
        .map_err(|e| format!("Failed to write {}: {}", path, e))?;
    for (i, &ref_base) in BASES.iter().enumerate() {
        let row: Vec<String> = ref_stats.substitutions[i]
            .iter()
            .map(|count| count.to_string())
            .collect();
        writeln!(writer, "{}\t{}", ref_base as char, row.join("\t"))
            .map_err(|e| format!("Failed to write {}: {}", path, e))?;
    }
    finish(writer, path)
}

fn write_kmers(path: &str, ref_stats: &ReferenceStatistics) -> Result<()> {
    let mut writer = open(path)?;
    writeln!(writer, "kind\tkmer\tcount").map_err(|e| format!("Failed to write {}: {}", path, e))?;
    let tables = [
        ("substitution", &ref_stats.sub_kmers),
        ("insertion", &ref_stats.ins_kmers),
        ("deletion", &ref_stats.del_kmers),
    ];
    for (kind, table) in tables {
        for (kmer, count) in table {
            writeln!(writer, "{}\t{}\t{}", kind, kmer, count)
                .map_err(|e| format!("Failed to write {}: {}", path, e))?;
        }
    }
    finish(writer, path)
}

/// Positional error histogram, substitution matrix, and k-mer context
/// tables, one file set per reference.
pub fn write_reference_stat_files(
    output_prefix: &str,
    read_type: ReadType,
    stats: &TypeStats,
) -> Result<()> {
    for (ref_id, ref_stats) in &stats.refs {
        let base = format!("{}.{}.{}", output_prefix, read_type, safe_ref_id(ref_id));
        write_error_histogram(&format!("{}.errors.tsv", base), ref_stats)?;
        write_substitutions(&format!("{}.substitutions.tsv", base), ref_stats)?;
        write_kmers(&format!("{}.kmers.tsv", base), ref_stats)?;
    }
    Ok(())
}

/// Read-length summary across all processed read types.
pub fn write_read_length_summary(output_prefix: &str, overall: &OverallStats) -> Result<()> {
    let path = format!("{}.read_lengths.tsv", output_prefix);
    let mut writer = open(&path)?;
    writeln!(writer, "read_type\treads\tmin\tmax\tmean\ttotal_bases")
        .map_err(|e| format!("Failed to write {}: {}", path, e))?;
    for (read_type, stats) in &overall.by_type {
        let lengths = &stats.read_lengths;
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{:.1}\t{}",
            read_type,
            lengths.count,
            lengths.min.unwrap_or(0),
            lengths.max.unwrap_or(0),
            lengths.mean(),
            lengths.total_bases
        )
        .map_err(|e| format!("Failed to write {}: {}", path, e))?;
    }
    finish(writer, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::stats::ReadDelta;

    fn type_stats() -> TypeStats {
        let mut delta = ReadDelta::new("read1", "ref1", 20);
        delta.aligned_bases = 10;
        delta.matches = 8;
        delta.mismatches = 1;
        delta.deletions = 1;
        delta.error_positions = vec![4, 6];
        delta.substitutions = vec![(b'G', b'A')];
        delta.sub_kmers = vec!["CGGTT".to_string()];
        delta.del_kmers = vec!["GGTTA".to_string()];
        let mut stats = TypeStats::default();
        stats.commit_read(&delta, 16);
        stats
    }

    #[test]
    fn test_type_summary() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("out").to_string_lossy().into_owned();
        write_type_summary(&prefix, ReadType::Template, &type_stats()).unwrap();
        let content =
            std::fs::read_to_string(format!("{}.template.summary.tsv", prefix)).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("reference\t"));
        assert_eq!(lines.next().unwrap(), "ref1\t1\t10\t8\t1\t0\t1\t0.8000");
    }

    #[test]
    fn test_reference_stat_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("out").to_string_lossy().into_owned();
        write_reference_stat_files(&prefix, ReadType::Template, &type_stats()).unwrap();

        let errors =
            std::fs::read_to_string(format!("{}.template.ref1.errors.tsv", prefix)).unwrap();
        // 1-based positions, zero rows omitted
        assert_eq!(errors, "position\terrors\n5\t1\n7\t1\n");

        let subs = std::fs::read_to_string(format!("{}.template.ref1.substitutions.tsv", prefix))
            .unwrap();
        assert!(subs.contains("G\t1\t0\t0\t0"));

        let kmers =
            std::fs::read_to_string(format!("{}.template.ref1.kmers.tsv", prefix)).unwrap();
        assert!(kmers.contains("substitution\tCGGTT\t1"));
        assert!(kmers.contains("deletion\tGGTTA\t1"));
    }

    #[test]
    fn test_safe_ref_id() {
        assert_eq!(safe_ref_id("gi|123|ref|NZ_1.1|"), "gi_123_ref_NZ_1.1_");
    }

    #[test]
    fn test_read_length_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("out").to_string_lossy().into_owned();
        let mut overall = OverallStats::new();
        overall.insert(ReadType::Consensus, type_stats());
        write_read_length_summary(&prefix, &overall).unwrap();
        let content = std::fs::read_to_string(format!("{}.read_lengths.tsv", prefix)).unwrap();
        assert!(content.contains("consensus\t1\t20\t20\t20.0\t20"));
    }
}
