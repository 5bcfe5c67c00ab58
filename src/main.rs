use clap::Parser;
use readprof::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{analyze, compare},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Analyze(_) => "analyze",
        Command::Compare(_) => "compare",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Analyze(args) => analyze::analyze(args)?,
        Command::Compare(args) => compare::compare(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
