//! Remdex CLI: index a remote (or locally mounted) file tree into a SQLite document store.

use anyhow::Result;
use clap::Parser;
use remdex::engine::arg_parser::Cli;
use remdex::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
