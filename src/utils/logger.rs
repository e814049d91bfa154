//! env_logger setup for the binary.

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Dependencies log at `Warn`; this crate at `Info`, or `Debug` when `verbose`. `RUST_LOG`
/// is read first, then these filters apply. Later calls are no-ops.
///
/// Records from the pool's evictor and from background runs carry their thread name
/// (`remdex-evictor`, `remdex-run-7`) so interleaved output can be told apart.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let tag = match std::thread::current().name() {
                Some(thread) if thread != "main" => {
                    format!("{} {}", env!("CARGO_PKG_NAME"), thread).cyan()
                }
                _ => env!("CARGO_PKG_NAME").cyan(),
            };
            match record.level() {
                Level::Error | Level::Warn => {
                    let level = if record.level() == Level::Warn {
                        "WARN".yellow()
                    } else {
                        "ERROR".red().bold()
                    };
                    writeln!(
                        buf,
                        "[{} {} {} {}] {}",
                        buf.timestamp_seconds(),
                        tag,
                        level,
                        record.target().white(),
                        record.args()
                    )
                }
                Level::Info => writeln!(buf, "[{}] {}", tag, record.args()),
                Level::Debug | Level::Trace => {
                    writeln!(buf, "[{} {}] {}", tag, "DEBUG".dimmed(), record.args())
                }
            }
        })
        .try_init();
}
