//! `herald watch`: keeps a BannerCenter active and prints every change.
//!
//! The center never reconnects on its own. When the stream drops and nothing
//! else is pending, this loop waits `RETRY_PAUSE` and activates again.

use crate::render::print_snapshot;
use herald_core::BannerCenter;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

const RETRY_PAUSE: Duration = Duration::from_secs(5);

pub async fn run(mut center: BannerCenter, json: bool) -> Result<(), String> {
    let mut updates = center.watch();
    let mut hangup = signal(SignalKind::hangup())
        .map_err(|e| format!("Failed to install SIGHUP handler: {}", e))?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    center.activate().await;
    print_snapshot(&updates.borrow_and_update(), json)?;

    let mut retry_at: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted; shutting down");
                break;
            }
            Some(()) = hangup.recv() => {
                if !center.settings_updated() {
                    debug!("Settings refresh suppressed");
                }
            }
            _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                retry_at = None;
                info!("Re-activating banner center");
                center.activate().await;
            }
            alive = center.pump(), if retry_at.is_none() => {
                if !alive {
                    info!(pause_secs = RETRY_PAUSE.as_secs(), "Banner service quiet; retrying later");
                    retry_at = Some(Instant::now() + RETRY_PAUSE);
                }
            }
        }

        if updates.has_changed().unwrap_or(false) {
            let snapshot = updates.borrow_and_update().clone();
            if !json {
                println!();
            }
            print_snapshot(&snapshot, json)?;
        }
    }

    center.deactivate();
    Ok(())
}
