//! BannerCenter - the entry point for herald clients.
//!
//! Ties the engine, the refresh arbiter and the remote client together for
//! one consuming view. Construct it when the view becomes visible, call
//! [`BannerCenter::activate`], then drive it with [`BannerCenter::pump`].
//!
//! All mutation happens on the task that owns the center. The only
//! suspension points are the remote fetch (run on a spawned task whose
//! result comes back through a channel) and the wait for the next stream
//! message, so no locking is needed. Methods that start a fetch must be
//! called from within a tokio runtime.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let mut center = BannerCenter::new(source, dismissals, Box::new(NoLocalChecks), &config);
//! center.activate().await;
//! while center.pump().await {
//!     render(&center.snapshot());
//! }
//! ```

use crate::arbiter::{Phase, RefreshArbiter, RefreshTicket};
use crate::client::{client_context, BannerSource, StreamEvent, Subscription};
use crate::config::HeraldConfig;
use crate::dismissals::{DismissalStore, Tier};
use crate::engine::{BannerSnapshot, ReconciliationEngine};
use crate::error::Result;
use crate::local::LocalCheckProducer;
use herald_protocol::Banner;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct FetchCompletion {
    ticket: RefreshTicket,
    result: Result<Vec<Banner>>,
}

pub struct BannerCenter {
    engine: ReconciliationEngine,
    arbiter: RefreshArbiter,
    source: Arc<dyn BannerSource>,
    subscription: Option<Subscription>,
    stream_enabled: bool,
    completions_tx: mpsc::UnboundedSender<FetchCompletion>,
    completions_rx: mpsc::UnboundedReceiver<FetchCompletion>,
}

impl BannerCenter {
    pub fn new(
        source: Arc<dyn BannerSource>,
        dismissals: DismissalStore,
        local: Box<dyn LocalCheckProducer>,
        config: &HeraldConfig,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            engine: ReconciliationEngine::new(dismissals, local),
            arbiter: RefreshArbiter::new(config.refresh_guard()),
            source,
            subscription: None,
            stream_enabled: config.stream_enabled,
            completions_tx,
            completions_rx,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts an immediate refresh, then opens the live stream.
    ///
    /// Calling this while already active re-opens the stream; the refresh is
    /// still subject to the guard window.
    pub async fn activate(&mut self) {
        self.arbiter.activate();
        self.request_refresh();
        if self.stream_enabled {
            self.open_stream().await;
        }
    }

    /// Closes the stream and returns to `Idle`. Refreshes still in flight
    /// complete into the void.
    pub fn deactivate(&mut self) {
        self.close_stream();
        self.arbiter.deactivate();
        self.engine.set_loading(false);
        debug!("Banner center deactivated");
    }

    pub fn is_active(&self) -> bool {
        self.arbiter.is_active()
    }

    pub fn phase(&self) -> Phase {
        self.arbiter.phase()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Triggers
    // ─────────────────────────────────────────────────────────────────────────────

    /// One-shot refresh. Returns false when debounced or inactive.
    pub fn request_refresh(&mut self) -> bool {
        let Some(ticket) = self.arbiter.try_begin_refresh(Instant::now()) else {
            debug!("Banner refresh skipped (inactive or inside guard window)");
            return false;
        };

        let local = self.engine.refresh_local();
        let context = client_context(&self.source.endpoint());
        let source = Arc::clone(&self.source);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = source.fetch(&local, &context).await;
            let _ = completions.send(FetchCompletion { ticket, result });
        });

        self.engine.set_loading(true);
        true
    }

    /// Settings that affect server-side checks changed.
    pub fn settings_updated(&mut self) -> bool {
        self.request_refresh()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Dismissal
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn dismiss(&mut self, id: &str, permanent: bool) {
        info!(id, permanent, "Dismissing banner");
        self.engine.dismiss(id, permanent);
    }

    /// Clears both dismissal tiers and asks the service for a fresh batch.
    pub fn undismiss_all(&mut self) {
        info!("Restoring all dismissed banners");
        self.engine.undismiss_all();
        self.request_refresh();
    }

    /// The user's session ended: forgets session-tier dismissals only.
    pub fn end_session(&mut self) {
        info!("Ending dismissal session");
        self.engine.end_session();
    }

    pub fn dismissed_ids(&self, tier: Tier) -> Vec<String> {
        self.engine.dismissed_ids(tier)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> BannerSnapshot {
        self.engine.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<BannerSnapshot> {
        self.engine.watch()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Driving
    // ─────────────────────────────────────────────────────────────────────────────

    /// Waits for the next producer completion and applies it, together with
    /// every other completion that is already waiting, in one reconcile pass.
    /// Within a pass, refresh results are applied before stream batches, so
    /// the stream's batch wins when both arrive together.
    ///
    /// Returns false without waiting when nothing can arrive: no refresh in
    /// flight for this activation and no open stream.
    pub async fn pump(&mut self) -> bool {
        if self.arbiter.refreshes_in_flight() == 0 && self.subscription.is_none() {
            return false;
        }

        let mut fetched = Vec::new();
        let mut events = Vec::new();
        tokio::select! {
            biased;
            Some(done) = self.completions_rx.recv() => fetched.push(done),
            event = next_stream_event(&mut self.subscription) => events.push(event),
        }

        while let Ok(done) = self.completions_rx.try_recv() {
            fetched.push(done);
        }
        if let Some(subscription) = self.subscription.as_mut() {
            while !matches!(events.last(), Some(StreamEvent::Dropped(_))) {
                match subscription.try_recv() {
                    Some(event) => events.push(event),
                    None => break,
                }
            }
        }

        self.apply(fetched, events);
        true
    }

    fn apply(&mut self, fetched: Vec<FetchCompletion>, events: Vec<StreamEvent>) {
        let mut remote: Option<Vec<Banner>> = None;
        let mut answered = false;

        for FetchCompletion { ticket, result } in fetched {
            if !self.arbiter.finish_refresh(ticket) {
                debug!("Ignoring refresh result from a previous activation");
                continue;
            }
            answered = true;
            match result {
                Ok(batch) => remote = Some(batch),
                Err(err) => {
                    warn!(error = %err, "Banner refresh failed; reconciling local banners only");
                    remote = Some(Vec::new());
                }
            }
        }

        for event in events {
            answered = true;
            match event {
                StreamEvent::Batch(batch) => {
                    remote = Some(batch);
                }
                StreamEvent::Notice(message) => {
                    warn!(error = %message, "Banner stream reported an error");
                }
                StreamEvent::Malformed(details) => {
                    warn!(error = %details, "Ignoring malformed banner stream message");
                }
                StreamEvent::Dropped(reason) => {
                    warn!(error = %reason, "Banner stream dropped; waiting for re-activation");
                    self.close_stream();
                }
            }
        }

        if let Some(remote) = remote {
            self.engine.apply_inputs(remote, false);
        } else if answered {
            self.engine.set_loading(false);
        }
    }

    async fn open_stream(&mut self) {
        self.close_stream();
        self.engine.set_loading(true);
        match self.source.subscribe().await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.arbiter.stream_opened();
                info!("Banner stream connected");
            }
            Err(err) => {
                warn!(error = %err, "Failed to open banner stream");
                if self.arbiter.refreshes_in_flight() == 0 {
                    self.engine.set_loading(false);
                }
            }
        }
    }

    fn close_stream(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            debug!("Banner stream closed");
        }
        self.arbiter.stream_closed();
    }
}

impl Drop for BannerCenter {
    fn drop(&mut self) {
        self.close_stream();
    }
}

async fn next_stream_event(subscription: &mut Option<Subscription>) -> StreamEvent {
    match subscription {
        Some(subscription) => subscription
            .recv()
            .await
            .unwrap_or_else(|| StreamEvent::Dropped("banner stream ended".to_string())),
        None => std::future::pending().await,
    }
}
