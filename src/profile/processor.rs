use crate::profile::overall::{CommitOutcome, TypeStats};
use crate::profile::parsers::{AlignmentFormat, AlignmentParser, ParseError};
use crate::profile::read_type::ReadType;
use crate::profile::refseq::{ReferenceRegistry, ReferenceSource};
use crate::profile::select::ReadAlignmentSet;
use crate::profile::stats::ReadDelta;
use crate::profile::walk::walk_record;
use crate::profile::writers::UnalignedTableWriter;
use crate::utils::Result;
use crossbeam_channel::{bounded, Sender};
use rayon::iter::{ParallelBridge, ParallelIterator};
use rayon::ThreadPoolBuilder;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

#[derive(Debug, Clone)]
pub struct PhaseParams {
    pub alignments_dir: PathBuf,
    pub genome_path: PathBuf,
    pub format: AlignmentFormat,
    pub kmer_len: usize,
    pub num_threads: usize,
}

#[derive(Debug, Clone)]
struct ThreadContextParams {
    genome_path: PathBuf,
}

thread_local! {
    static CTX_PARAMS: RefCell<Option<ThreadContextParams>> = const { RefCell::new(None) };
}

fn create_thread_local_registry() -> ReferenceRegistry {
    let path = CTX_PARAMS.with(|ctx_cell| {
        ctx_cell
            .borrow()
            .as_ref()
            .expect("Thread context parameters not initialized for genome path")
            .genome_path
            .clone()
    });
    ReferenceRegistry::from_path(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to initialize reference registry for {}: {}",
            path.display(),
            e
        )
    })
}

thread_local! {
    // Per-worker faidx handle; faidx readers are not Sync
    static THREAD_REGISTRY: RefCell<ReferenceRegistry> =
        RefCell::new(create_thread_local_registry());
}

const CHANNEL_BUFFER_SIZE: usize = 2048;

/// Process every alignment file of one read type across the worker pool.
///
/// Workers run parse -> sort -> select -> walk without touching shared
/// state; only the commit (duplicate check + statistics update) enters the
/// phase mutex. Unaligned-summary lines flow to a dedicated writer thread.
pub fn run_phase(
    read_type: ReadType,
    params: &PhaseParams,
    unaligned_path: &Path,
) -> Result<TypeStats> {
    let read_dir = params.alignments_dir.join(read_type.dir_name());

    let (sender_path, receiver_path) = bounded(CHANNEL_BUFFER_SIZE);
    let stream_dir = read_dir.clone();
    let producer_thread = thread::spawn(move || stream_alignment_files(&stream_dir, sender_path));

    let mut summary_writer = UnalignedTableWriter::new(unaligned_path)?;
    let (sender_unaligned, receiver_unaligned) =
        bounded::<(String, String)>(CHANNEL_BUFFER_SIZE);
    let writer_thread = thread::spawn(move || {
        for (read_id, reason) in &receiver_unaligned {
            if let Err(e) = summary_writer.write(&read_id, &reason) {
                log::error!("Failed to write unaligned summary line: {}", e);
            }
        }
        if let Err(e) = summary_writer.flush() {
            log::error!("Failed to flush unaligned summary: {}", e);
        }
    });

    let stats = Mutex::new(TypeStats::default());
    log::debug!(
        "Initializing thread pool with {} threads...",
        params.num_threads
    );
    let pool = initialize_thread_pool(
        params.num_threads,
        ThreadContextParams {
            genome_path: params.genome_path.clone(),
        },
    )?;
    let parser = params.format.parser();
    pool.install(|| {
        receiver_path
            .into_iter()
            .par_bridge()
            .for_each_with(&sender_unaligned, |sender, path: PathBuf| {
                process_read(&path, parser, params, &stats, sender)
            });
    });

    // Clean-up
    drop(sender_unaligned);
    writer_thread
        .join()
        .expect("Unaligned summary writer thread panicked");
    match producer_thread
        .join()
        .expect("Alignment file stream thread panicked")
    {
        Ok(count) => log::debug!("{}: streamed {} alignment files", read_type, count),
        Err(e) => {
            return Err(format!(
                "Failed to read alignment directory {}: {}",
                read_dir.display(),
                e
            ))
        }
    }

    stats
        .into_inner()
        .map_err(|_| "Phase statistics mutex poisoned".to_string())
}

/// Stream one alignment-file path per read into the channel, in sorted
/// order so enumeration is reproducible.
fn stream_alignment_files(dir: &Path, sender: Sender<PathBuf>) -> std::io::Result<usize> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && !path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with('.'))
        })
        .collect();
    paths.sort();
    let count = paths.len();
    for path in paths {
        if sender.send(path).is_err() {
            break;
        }
    }
    Ok(count)
}

fn process_read(
    path: &Path,
    parser: &dyn AlignmentParser,
    params: &PhaseParams,
    stats: &Mutex<TypeStats>,
    sender_unaligned: &Sender<(String, String)>,
) {
    let mark_unaligned = |read_id: String, reason: String| {
        stats.lock().unwrap().register_unaligned();
        if let Err(e) = sender_unaligned.send((read_id, reason)) {
            log::error!("Failed to send unaligned summary line: {}", e);
        }
    };

    THREAD_REGISTRY.with(|registry_cell| {
        let registry = registry_cell.borrow();
        let outcome = match parser.parse_file(path, &*registry) {
            Ok(outcome) => outcome,
            Err(ParseError::Io(e)) => {
                mark_unaligned(
                    read_file_stem(path),
                    format!("alignment file unreadable: {}", e),
                );
                return;
            }
            Err(ParseError::Format(reason)) => {
                mark_unaligned(read_file_stem(path), reason);
                return;
            }
        };
        for (line, reason) in &outcome.skipped {
            log::warn!("{}: skipped record at line {}: {}", path.display(), line, reason);
        }
        if outcome.records.is_empty() {
            mark_unaligned(read_file_stem(path), "no alignments".to_string());
            return;
        }

        let winning = ReadAlignmentSet::new(outcome.records)
            .highest_scoring_set()
            .expect("Non-empty alignment set has a winning reference");
        let read_id = winning[0].read_id.clone();
        let ref_id = winning[0].ref_id.clone();
        let mut delta = ReadDelta::new(&read_id, &ref_id, winning[0].read_len);
        let mut walked = 0usize;
        for record in &winning {
            match walk_record(record, &*registry, params.kmer_len) {
                Ok(record_delta) => {
                    delta.absorb(record_delta);
                    walked += 1;
                }
                Err(e) => log::warn!("{}: skipped record: {}", path.display(), e),
            }
        }
        if walked == 0 {
            mark_unaligned(read_id, "all alignment records failed validation".to_string());
            return;
        }

        let ref_len = registry
            .sequence_length(&ref_id)
            .expect("Walked records always reference a known sequence");
        let commit = stats.lock().unwrap().commit_read(&delta, ref_len);
        if commit == CommitOutcome::Duplicate {
            log::debug!("{}: ignored duplicate read id {}", path.display(), read_id);
        }
    });
}

/// Read id used in the unaligned table when no record names the read:
/// the file name minus compression and format extensions.
fn read_file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let name = name
        .strip_suffix(".gz")
        .or_else(|| name.strip_suffix(".gzip"))
        .unwrap_or(&name)
        .to_string();
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

fn initialize_thread_pool(
    num_threads: usize,
    thread_context: ThreadContextParams,
) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("readprof-{}", i))
        .start_handler(move |_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = Some(thread_context.clone());
            });
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .exit_handler(|_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = None;
            });
        })
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}
