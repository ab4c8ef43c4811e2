//! Local checks the CLI runs before every reconcile pass.

use herald_core::{Banner, BannerType, LocalCheckProducer};
use std::path::PathBuf;

pub const SOCKET_MISSING_ID: &str = "herald-socket-missing";

/// Warns when the banner service socket does not exist, so an offline
/// service is visible even though the remote side cannot report it.
pub fn socket_check(socket: PathBuf) -> impl LocalCheckProducer {
    move || {
        if socket.exists() {
            return Vec::new();
        }
        vec![Banner::new(SOCKET_MISSING_ID)
            .with_kind(BannerType::Warning)
            .with_priority(-1.0)
            .with_field(
                "message",
                format!("Banner service not running (no socket at {})", socket.display()),
            )]
    }
}
