//! Tracing subscriber initialization for the letterhead binary.
//!
//! # Priority (highest to lowest)
//!
//! 1. `LETTERHEAD_LOG` env var (per-target directives, e.g. `letterhead=debug,warn`)
//! 2. `RUST_LOG` env var
//! 3. Mode default: `info` for the interactive console, `warn` in the background

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Environment variable holding project-specific filter directives.
pub const LOG_ENV: &str = "LETTERHEAD_LOG";

/// How the binary is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Interactive console.
    Console,
    /// `--start-minimized`.
    Background,
}

impl RunMode {
    /// Pick the mode from the CLI flag.
    pub const fn from_flag(start_minimized: bool) -> Self {
        if start_minimized {
            Self::Background
        } else {
            Self::Console
        }
    }

    /// Level used when no environment override is present.
    pub const fn default_level(self) -> Level {
        match self {
            Self::Console => Level::INFO,
            Self::Background => Level::WARN,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called once, before the configuration is loaded.
pub fn init_subscriber(mode: RunMode) {
    let filter = build_env_filter(mode);
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(false)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn build_env_filter(mode: RunMode) -> EnvFilter {
    // Unparseable values fall through instead of failing startup.
    if let Ok(directives) = std::env::var(LOG_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = mode.default_level();
    // The console already prints activity lines itself.
    let directive = match mode {
        RunMode::Console => format!("{level},letterhead::activity=off,letterhead::notify=off"),
        RunMode::Background => format!("{level},letterhead::activity=info,letterhead::notify=info"),
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}
