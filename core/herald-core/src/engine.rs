//! ReconciliationEngine - owns the latest producer outputs and the published list.
//!
//! Inputs change only through named operations (`apply_inputs`, `dismiss`,
//! `undismiss_all`, `set_loading`), and each one re-runs the reconcile pass
//! and publishes the result. Renderers observe the output through a
//! `tokio::sync::watch` channel that only fires when the output changes.

use crate::dismissals::{DismissalStore, Tier};
use crate::local::LocalCheckProducer;
use crate::reconcile::reconcile;
use herald_protocol::Banner;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// What a renderer sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BannerSnapshot {
    pub banners: Vec<Banner>,
    pub has_dismissed_banners: bool,
    /// True while a refresh or a freshly opened stream has not answered yet.
    pub loading: bool,
}

pub struct ReconciliationEngine {
    dismissals: DismissalStore,
    local: Box<dyn LocalCheckProducer>,
    local_banners: Vec<Banner>,
    remote_banners: Vec<Banner>,
    loading: bool,
    published: watch::Sender<BannerSnapshot>,
}

impl ReconciliationEngine {
    pub fn new(dismissals: DismissalStore, local: Box<dyn LocalCheckProducer>) -> Self {
        let (published, _) = watch::channel(BannerSnapshot::default());
        Self {
            dismissals,
            local,
            local_banners: Vec::new(),
            remote_banners: Vec::new(),
            loading: false,
            published,
        }
    }

    pub fn watch(&self) -> watch::Receiver<BannerSnapshot> {
        self.published.subscribe()
    }

    pub fn snapshot(&self) -> BannerSnapshot {
        self.published.borrow().clone()
    }

    pub fn dismissed_ids(&self, tier: Tier) -> Vec<String> {
        self.dismissals.tier_ids(tier)
    }

    /// Runs the local checks and keeps their output as the current local input.
    pub fn refresh_local(&mut self) -> Vec<Banner> {
        self.local_banners = self.local.check();
        self.local_banners.clone()
    }

    /// Applies one round of producer outputs in a single pass.
    ///
    /// Local checks always re-run; `remote` replaces the remote input. A
    /// failed fetch is applied as an empty batch.
    pub fn apply_inputs(&mut self, remote: Vec<Banner>, loading: bool) -> bool {
        self.refresh_local();
        self.remote_banners = remote;
        self.loading = loading;
        self.publish()
    }

    pub fn set_loading(&mut self, loading: bool) -> bool {
        self.loading = loading;
        self.publish()
    }

    pub fn dismiss(&mut self, id: &str, permanent: bool) -> bool {
        self.dismissals.dismiss(id, permanent);
        self.publish()
    }

    pub fn undismiss_all(&mut self) -> bool {
        self.dismissals.undismiss_all();
        self.publish()
    }

    /// Clears the session tier (session end) and re-publishes.
    pub fn end_session(&mut self) -> bool {
        self.dismissals.end_session();
        self.publish()
    }

    /// Re-runs the reconcile pass over the cached inputs. Returns true if the
    /// published snapshot changed.
    pub fn publish(&mut self) -> bool {
        let dismissed = self.dismissals.all_dismissed_ids();
        let result = reconcile(&self.local_banners, &self.remote_banners, &dismissed);
        let next = BannerSnapshot {
            banners: result.banners,
            has_dismissed_banners: result.has_dismissed_banners,
            loading: self.loading,
        };
        let changed = self.published.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            let snapshot = self.published.borrow();
            debug!(
                banners = snapshot.banners.len(),
                has_dismissed = snapshot.has_dismissed_banners,
                loading = snapshot.loading,
                "Published banners"
            );
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::StaticChecks;

    fn engine_with_local(local: Vec<Banner>) -> ReconciliationEngine {
        ReconciliationEngine::new(DismissalStore::in_memory(), Box::new(StaticChecks(local)))
    }

    fn published_ids(engine: &ReconciliationEngine) -> Vec<String> {
        engine
            .snapshot()
            .banners
            .iter()
            .filter_map(|b| b.id().map(str::to_string))
            .collect()
    }

    #[test]
    fn apply_merges_local_and_remote() {
        let mut engine = engine_with_local(vec![Banner::new("local")]);
        assert!(engine.apply_inputs(vec![Banner::new("remote").with_priority(1.0)], false));
        assert_eq!(published_ids(&engine), vec!["remote", "local"]);
    }

    #[test]
    fn empty_remote_batch_clears_remote_banners() {
        let mut engine = engine_with_local(vec![Banner::new("local")]);
        engine.apply_inputs(vec![Banner::new("r")], false);
        engine.apply_inputs(Vec::new(), false);
        assert_eq!(published_ids(&engine), vec!["local"]);
    }

    #[test]
    fn unchanged_inputs_do_not_republish() {
        let mut engine = engine_with_local(vec![Banner::new("a")]);
        assert!(engine.apply_inputs(vec![], false));
        assert!(!engine.apply_inputs(vec![], false));
    }

    #[test]
    fn dismiss_hides_and_flags() {
        let mut engine = engine_with_local(vec![]);
        engine.apply_inputs(vec![Banner::new("x"), Banner::new("y")], false);

        assert!(engine.dismiss("x", false));
        let snapshot = engine.snapshot();
        assert_eq!(published_ids(&engine), vec!["y"]);
        assert!(snapshot.has_dismissed_banners);

        assert!(engine.undismiss_all());
        assert!(!engine.snapshot().has_dismissed_banners);
        assert_eq!(published_ids(&engine), vec!["x", "y"]);
    }

    #[test]
    fn permanent_dismissal_survives_new_batches() {
        let mut engine = engine_with_local(vec![]);
        engine.dismiss("x", true);

        engine.apply_inputs(vec![Banner::new("x")], false);
        assert!(published_ids(&engine).is_empty());
        engine.apply_inputs(vec![Banner::new("x").with_priority(9.0), Banner::new("z")], false);
        assert_eq!(published_ids(&engine), vec!["z"]);

        engine.end_session();
        assert_eq!(published_ids(&engine), vec!["z"]);
    }

    #[test]
    fn watchers_see_changes() {
        let mut engine = engine_with_local(vec![]);
        let mut rx = engine.watch();
        assert!(!rx.has_changed().unwrap());

        engine.set_loading(true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().loading);
    }
}
