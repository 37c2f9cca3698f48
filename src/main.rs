mod bio;
mod cli;
mod error;
mod io;
mod metadata;
mod palindromes;
mod stats;
mod windows;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();
    let cli = cli::Cli::parse();
    cli::run_cli(cli)
}
