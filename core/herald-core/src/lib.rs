//! # herald-core
//!
//! Banner reconciliation for herald clients. Status banners come from two
//! independent producers: synchronous local checks in the client, and a
//! banner service that answers one-shot requests and pushes full batches over
//! a live stream. This crate merges both into one deduplicated,
//! priority-ordered list, filtered by the user's dismissals.
//!
//! ## Design Principles
//!
//! - **Single owner**: a [`BannerCenter`] is owned by one task; no locks.
//! - **Graceful degradation**: a missing service or unreadable storage means
//!   fewer banners, never an error in front of the user.
//! - **Explicit lifecycle**: construct on view activation, drop or
//!   [`BannerCenter::deactivate`] when hidden.
//!
//! ## Module Structure
//!
//! - [`reconcile`]: the pure merge/dedup/filter/sort pass
//! - [`engine`]: cached producer outputs and the published snapshot
//! - [`arbiter`]: refresh debounce and stream phase tracking
//! - [`client`]: the banner service client and live subscriptions
//! - [`dismissals`]: two-tier dismissal persistence
//! - [`center`]: everything wired together for one consuming view

pub mod arbiter;
pub mod center;
pub mod client;
pub mod config;
pub mod dismissals;
pub mod engine;
pub mod error;
pub mod local;
pub mod reconcile;
pub mod storage;

pub use arbiter::{Phase, RefreshArbiter};
pub use center::BannerCenter;
pub use client::{client_context, BannerSource, SocketBannerClient, StreamEvent, Subscription};
pub use config::{load_config_with_storage, HeraldConfig};
pub use dismissals::{
    discard_session_scope, DismissalStore, FileScope, KeyValueScope, MemoryScope, Tier,
};
pub use engine::{BannerSnapshot, ReconciliationEngine};
pub use error::{HeraldError, Result};
pub use herald_protocol::{Banner, BannerType, ClientContext};
pub use local::{LocalCheckProducer, NoLocalChecks, StaticChecks};
pub use reconcile::{reconcile, Reconciled};
pub use storage::StorageConfig;
