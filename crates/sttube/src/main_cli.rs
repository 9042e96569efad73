//! STTube CLI — inspect and drive USB devices through the STTubeDevice30 driver.
//!
//! Console subsystem: works normally in PowerShell, cmd, and other terminals.

use std::path::PathBuf;

use clap::Parser;

mod cli;

#[derive(Parser)]
#[command(
    name = "sttube-cli",
    version,
    about = "Inspect and control USB devices through the STMicroelectronics STTubeDevice driver"
)]
struct Args {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(e) = cli::run(args.command, args.json, args.config.as_deref()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
