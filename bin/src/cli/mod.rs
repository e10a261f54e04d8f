use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simplelog::LevelFilter;

mod compile;
mod dryrun;
mod dumpir;

/// Compiles tool descriptors into typed command-line wrapper modules.
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Logging level.
    #[arg(long, default_value = "Warn")]
    log_level: LevelFilter,
}

#[derive(Subcommand)]
enum Command {
    Compile(compile::Command),
    DryRun(dryrun::Command),
    DumpIr(dumpir::Command),
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())
        .with_context(|| "configuring logging")?;

    use Command::*;
    match &args.command {
        Compile(cmd) => compile::run(cmd),
        DryRun(cmd) => dryrun::run(cmd),
        DumpIr(cmd) => dumpir::run(cmd),
    }
}
