use crate::cli::AnalyzeArgs;
use crate::profile::overall::OverallStats;
use crate::profile::processor::{run_phase, PhaseParams};
use crate::profile::read_type::ReadType;
use crate::profile::refseq::ReferenceRegistry;
use crate::profile::writers;
use crate::utils::Result;
use std::path::Path;

/// Alignment counts below this are usable but suspicious.
const MIN_ALIGNED_READS_WARN: u64 = 400;

pub fn analyze(args: AnalyzeArgs) -> Result<()> {
    // Fail early if the genome is unusable; workers build their own handles
    let registry = ReferenceRegistry::from_path(&args.genome_path)?;
    log::info!(
        "Loaded {} reference sequences from {}",
        registry.reference_ids().count(),
        args.genome_path.display()
    );
    drop(registry);

    let params = PhaseParams {
        alignments_dir: args.alignments_dir.clone(),
        genome_path: args.genome_path.clone(),
        format: args.format,
        kmer_len: args.kmer_len,
        num_threads: args.num_threads,
    };

    let mut overall = OverallStats::new();
    for read_type in enabled_types(&args.read_types) {
        log::info!("Parsing {} reads", read_type);
        let unaligned_path = format!("{}.{}.unaligned.txt", args.output_prefix, read_type);
        let stats = run_phase(read_type, &params, Path::new(&unaligned_path))?;

        // Each read type is gated independently; outputs already written
        // for earlier types survive an abort here
        if stats.n_reads == 0 {
            return Err(format!(
                "Unable to find any {} reads to process in {}",
                read_type,
                params.alignments_dir.join(read_type.dir_name()).display()
            ));
        }
        if stats.n_reads_aligned == 0 {
            return Err(format!(
                "Unable to find any {} alignments to process. Common reasons for this: \
                 empty alignment files from a failed aligner invocation, or the wrong \
                 reference given to the alignment stage",
                read_type
            ));
        }
        if stats.n_reads_aligned < MIN_ALIGNED_READS_WARN {
            log::warn!(
                "Not many alignments ({}) found to process",
                stats.n_reads_aligned
            );
        }
        if stats.ignored_duplicates > 0 {
            log::info!("{} ignored duplicate read ids", stats.ignored_duplicates);
        }
        log::info!(
            "{}: {} of {} reads aligned",
            read_type,
            stats.n_reads_aligned,
            stats.n_reads
        );

        writers::write_type_summary(&args.output_prefix, read_type, &stats)?;
        writers::write_reference_stat_files(&args.output_prefix, read_type, &stats)?;
        overall.insert(read_type, stats);
    }

    writers::write_read_length_summary(&args.output_prefix, &overall)?;
    let snapshot_path = format!("{}.profile.bin", args.output_prefix);
    overall.save(Path::new(&snapshot_path))?;
    log::info!("Wrote statistics snapshot to {}", snapshot_path);
    Ok(())
}

/// Requested types in canonical phase order, deduplicated.
fn enabled_types(requested: &[ReadType]) -> Vec<ReadType> {
    ReadType::all()
        .into_iter()
        .filter(|read_type| requested.contains(read_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_types_are_ordered_and_deduplicated() {
        let requested = vec![
            ReadType::Consensus,
            ReadType::Template,
            ReadType::Consensus,
        ];
        assert_eq!(
            enabled_types(&requested),
            vec![ReadType::Template, ReadType::Consensus]
        );
    }
}
