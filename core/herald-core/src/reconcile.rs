//! Merge, dedup, filter and sort of banner candidates.
//!
//! 1. Local candidates first, then remote, keyed by id; a later entry with
//!    the same id replaces the earlier one in place (remote wins).
//! 2. Dismissed ids are dropped unless the banner is non-dismissible.
//!    Banners without an id are always kept and never deduplicated.
//! 3. Stable sort by descending priority.
//! 4. `has_dismissed_banners` is true iff some dismissible candidate id
//!    (before filtering) is in the dismissed set.
//!
//! The pass is a pure function of its inputs, so running it twice on the same
//! inputs yields the same output.

use herald_protocol::Banner;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub banners: Vec<Banner>,
    pub has_dismissed_banners: bool,
}

pub fn reconcile(local: &[Banner], remote: &[Banner], dismissed: &HashSet<String>) -> Reconciled {
    let mut merged: Vec<&Banner> = Vec::with_capacity(local.len() + remote.len());
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for banner in local.iter().chain(remote) {
        match banner.id() {
            Some(id) => match slots.get(id) {
                Some(&slot) => merged[slot] = banner,
                None => {
                    slots.insert(id, merged.len());
                    merged.push(banner);
                }
            },
            None => merged.push(banner),
        }
    }

    let has_dismissed_banners = local
        .iter()
        .chain(remote)
        .filter_map(Banner::dismissal_key)
        .any(|id| dismissed.contains(id));

    let mut banners: Vec<Banner> = merged
        .into_iter()
        .filter(|banner| {
            banner
                .dismissal_key()
                .map_or(true, |id| !dismissed.contains(id))
        })
        .cloned()
        .collect();
    banners.sort_by(|a, b| a.cmp_priority_desc(b));

    Reconciled {
        banners,
        has_dismissed_banners,
    }
}
