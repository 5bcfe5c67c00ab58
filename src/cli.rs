use crate::profile::parsers::AlignmentFormat;
use crate::profile::read_type::ReadType;
use crate::utils::Result;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="readprof",
          version=&**FULL_VERSION,
          about="Alignment-based error profiling for long-read sequencing data",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Alignment Error Profiler")]
    Analyze(AnalyzeArgs),
    #[clap(about = "Statistics Snapshot Comparator")]
    Compare(CompareArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("analyze")))]
#[command(arg_required_else_help(true))]
pub struct AnalyzeArgs {
    #[clap(required = true)]
    #[clap(short = 'a')]
    #[clap(long = "alignments")]
    #[clap(help = "Directory with per-read-type alignment subdirectories")]
    #[clap(value_name = "DIR")]
    #[arg(value_parser = check_dir_exists)]
    pub alignments_dir: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "genome")]
    #[clap(help = "Path to reference genome FASTA (faidx indexed)")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'f')]
    #[clap(long = "format")]
    #[clap(help = "Alignment file format (maf, sam, or m5)")]
    #[clap(value_name = "FORMAT")]
    #[arg(value_parser = format_from_string)]
    pub format: AlignmentFormat,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "types")]
    #[clap(value_name = "TYPES")]
    #[clap(help = "Read-type phases to run")]
    #[clap(value_delimiter = ',')]
    #[clap(default_value = "template,complement,consensus")]
    #[arg(value_parser = read_type_from_string)]
    pub read_types: Vec<ReadType>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "kmer-len")]
    #[clap(value_name = "KMER_LEN")]
    #[clap(help = "Length of the reference context window around each error (odd)")]
    #[clap(default_value = "5")]
    #[arg(value_parser = kmer_in_range)]
    pub kmer_len: usize,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("compare")))]
#[command(arg_required_else_help(true))]
pub struct CompareArgs {
    #[clap(required = true)]
    #[clap(long = "first")]
    #[clap(help = "First statistics snapshot")]
    #[clap(value_name = "SNAPSHOT")]
    #[arg(value_parser = check_file_exists)]
    pub first: PathBuf,

    #[clap(required = true)]
    #[clap(long = "second")]
    #[clap(help = "Second statistics snapshot")]
    #[clap(value_name = "SNAPSHOT")]
    #[arg(value_parser = check_file_exists)]
    pub second: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output comparison table path")]
    #[clap(value_name = "OUTPUT")]
    #[arg(value_parser = check_parent_path)]
    pub output: PathBuf,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn check_parent_path(s: &str) -> Result<PathBuf> {
    check_prefix_path(s).map(PathBuf::from)
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_dir_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.is_dir() {
        Err(format!("Directory does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn format_from_string(s: &str) -> Result<AlignmentFormat> {
    AlignmentFormat::from_str(s)
}

fn read_type_from_string(s: &str) -> Result<ReadType> {
    ReadType::from_str(s)
}

fn kmer_in_range(s: &str) -> Result<usize> {
    let kmer_len: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid k-mer length", s))?;
    if kmer_len % 2 == 1 {
        Ok(kmer_len)
    } else {
        Err(format!("K-mer length must be odd, got {}", kmer_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kmer_in_range() {
        assert_eq!(kmer_in_range("5").unwrap(), 5);
        assert!(kmer_in_range("4").is_err());
        assert!(kmer_in_range("x").is_err());
    }

    #[test]
    fn test_threads_in_range() {
        assert_eq!(threads_in_range("8").unwrap(), 8);
        assert!(threads_in_range("0").is_err());
    }
}
