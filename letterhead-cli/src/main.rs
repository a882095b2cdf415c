//! letterhead - Stamp a letterhead onto every page of new PDF invoices.
//!
//! Watches a folder and overlays a single-page letterhead onto each PDF that
//! appears in it, replacing the file in place.

mod cli;
mod commands;
mod console;
mod logging;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::console::{Console, ConsoleNotifier};
use crate::logging::RunMode;
use letterhead::config::{ConfigStore, SharedConfig};
use letterhead::output::{Notifier, TracingNotifier};
use letterhead::update;
use letterhead::watch::{WatchCoordinator, WatchOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mode = RunMode::from_flag(cli.start_minimized);
    logging::init_subscriber(mode);

    let store = ConfigStore::at_default_location();
    let config = SharedConfig::new(store.load());

    let console_out = ConsoleNotifier::new();
    let notifier: Arc<dyn Notifier> = match mode {
        RunMode::Console => Arc::new(console_out),
        RunMode::Background => Arc::new(TracingNotifier),
    };
    let coordinator = Arc::new(WatchCoordinator::new(
        config.clone(),
        Arc::clone(&notifier),
        WatchOptions::default(),
    ));

    resume_watching(&config, &coordinator);
    spawn_update_check(notifier);

    match mode {
        RunMode::Console => {
            Console::new(store, config, coordinator, console_out)
                .run()
                .await
                .context("failed to read console input")?;
        }
        RunMode::Background => {
            info!("Running in the background, press Ctrl-C to exit");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            coordinator.stop();
        }
    }

    Ok(())
}

/// Start watching if the saved configuration allows it.
fn resume_watching(config: &SharedConfig, coordinator: &WatchCoordinator) {
    let snapshot = config.snapshot();
    if !snapshot.is_complete() {
        debug!("Configuration incomplete, not watching");
        return;
    }
    let Some(folder) = snapshot.folder() else {
        return;
    };
    if let Err(e) = coordinator.start(&folder) {
        warn!("{e}");
        coordinator
            .pipeline()
            .notifier()
            .notify("Watch Failed", &e.to_string());
    }
}

/// Check the release feed on a blocking worker. Failures stay silent.
fn spawn_update_check(notifier: Arc<dyn Notifier>) {
    let Some(repo) = update::release_repo() else {
        debug!("No release feed configured");
        return;
    };

    tokio::task::spawn_blocking(move || {
        match update::check_for_update(repo, letterhead::VERSION) {
            Ok(Some(available)) => notifier.notify(
                "Update Available",
                &format!(
                    "letterhead {} is available: {}",
                    available.version, available.download_url
                ),
            ),
            Ok(None) => debug!("No update available"),
            Err(e) => debug!("Update check failed: {e}"),
        }
    });
}
