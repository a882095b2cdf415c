//! CLI argument parsing for letterhead.
//!
//! The binary takes almost no arguments: everything else is configured
//! interactively and persisted between runs.

use clap::Parser;

/// Watch a folder and stamp a letterhead onto every page of new PDF invoices.
///
/// Without arguments letterhead opens an interactive console where the
/// letterhead and the watch folder can be chosen, watching can be started
/// and stopped, and files can be merged by hand. Settings are saved to
/// ~/.pdf_letterhead_merger_config.json.
#[derive(Parser, Debug, Default)]
#[command(name = "letterhead")]
#[command(version)]
#[command(about = "Stamp a letterhead onto every page of new PDF invoices", long_about = None)]
#[command(author)]
pub struct Cli {
    /// Start in the background without the interactive console
    ///
    /// Resumes watching the saved folder if both the letterhead and the
    /// folder are configured, then runs until interrupted with Ctrl-C.
    /// Activity is reported through the log only.
    #[arg(long)]
    pub start_minimized: bool,
}
