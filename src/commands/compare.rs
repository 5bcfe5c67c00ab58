use crate::cli::CompareArgs;
use crate::profile::overall::OverallStats;
use crate::utils::Result;

/// Diff two statistics snapshots from prior runs. Both snapshots must carry
/// the current schema version; `OverallStats::load` fails fast otherwise.
pub fn compare(args: CompareArgs) -> Result<()> {
    let first = OverallStats::load(&args.first)?;
    let second = OverallStats::load(&args.second)?;

    let mut table = String::from(
        "read_type\treference\treads_first\treads_second\tidentity_first\tidentity_second\tidentity_delta\n",
    );
    for (read_type, stats_first) in &first.by_type {
        let Some(stats_second) = second.by_type.get(read_type) else {
            log::warn!(
                "Read type {} is only present in {}",
                read_type,
                args.first.display()
            );
            continue;
        };
        for (ref_id, ref_first) in &stats_first.refs {
            let Some(ref_second) = stats_second.refs.get(ref_id) else {
                log::warn!(
                    "{}: reference {} is only present in {}",
                    read_type,
                    ref_id,
                    args.first.display()
                );
                continue;
            };
            table.push_str(&format!(
                "{}\t{}\t{}\t{}\t{:.4}\t{:.4}\t{:+.4}\n",
                read_type,
                ref_id,
                ref_first.reads_aligned,
                ref_second.reads_aligned,
                ref_first.identity(),
                ref_second.identity(),
                ref_second.identity() - ref_first.identity()
            ));
        }
        for ref_id in stats_second.refs.keys() {
            if !stats_first.refs.contains_key(ref_id) {
                log::warn!(
                    "{}: reference {} is only present in {}",
                    read_type,
                    ref_id,
                    args.second.display()
                );
            }
        }
    }
    for read_type in second.by_type.keys() {
        if !first.by_type.contains_key(read_type) {
            log::warn!(
                "Read type {} is only present in {}",
                read_type,
                args.second.display()
            );
        }
    }

    std::fs::write(&args.output, table)
        .map_err(|e| format!("Failed to write {}: {}", args.output.display(), e))
}
