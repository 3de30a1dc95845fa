//! Per-application window counts for taskbar badges.
//!
//! Counts are derived from a state snapshot and memoized against its
//! timestamp, so repeated queries between recomputations are free.

use crate::events::Application;
use crate::services::detector::WindowState;
use crate::Window;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BadgeInfo {
    pub app: Application,
    pub count: usize,
    pub windows: Vec<Window>,
    pub visible: bool,
}

#[derive(Default)]
struct BadgeCache {
    last_timestamp: u64,
    badges: HashMap<String, BadgeInfo>,
}

#[derive(Default)]
pub struct BadgeCounter {
    cache: Mutex<BadgeCache>,
    computations: AtomicU64,
}

impl BadgeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Badge info for each given application, zero-count entries included.
    /// Served from the cache while the snapshot timestamp is unchanged.
    pub fn compute_for_apps(
        &self,
        state: &WindowState,
        apps: &[Application],
    ) -> HashMap<String, BadgeInfo> {
        let mut cache = self.cache.lock();
        // timestamp 0 means the empty pre-first-recompute snapshot; never
        // treat it as a cache hit.
        if state.timestamp != 0 && state.timestamp == cache.last_timestamp {
            return cache.badges.clone();
        }
        self.computations.fetch_add(1, Ordering::Relaxed);

        let mut badges = HashMap::new();
        for app in apps {
            // Sum over the groups the matcher already formed; re-matching
            // windows here could disagree with the grouping and count one
            // window under two applications.
            let windows: Vec<Window> = state
                .app_groups
                .values()
                .filter(|group| group.app.id == app.id)
                .flat_map(|group| group.windows.iter().cloned())
                .collect();
            let count = windows.len();
            badges.insert(
                app.id.clone(),
                BadgeInfo {
                    app: app.clone(),
                    count,
                    windows,
                    visible: count > 0,
                },
            );
        }
        debug!("badges recomputed for {} applications", badges.len());

        cache.last_timestamp = state.timestamp;
        cache.badges = badges.clone();
        badges
    }

    /// Badge info for every application with at least one window in the
    /// snapshot, aggregated from the app groups. Optionally skips pinned
    /// applications, which a taskbar renders from its pin list instead.
    pub fn compute_running(&self, state: &WindowState, exclude_pinned: bool) -> Vec<BadgeInfo> {
        let mut merged: HashMap<String, BadgeInfo> = HashMap::new();
        for group in state.app_groups.values() {
            if exclude_pinned && group.app.is_pinned {
                continue;
            }
            let entry = merged
                .entry(group.app.id.clone())
                .or_insert_with(|| BadgeInfo {
                    app: group.app.clone(),
                    count: 0,
                    windows: Vec::new(),
                    visible: false,
                });
            entry.count += group.windows.len();
            entry.windows.extend(group.windows.iter().cloned());
        }
        let mut badges: Vec<BadgeInfo> = merged
            .into_values()
            .map(|mut b| {
                b.visible = b.count > 0;
                b
            })
            .collect();
        badges.sort_by(|a, b| a.app.id.cmp(&b.app.id));
        badges
    }

    /// Number of cache misses. Test observability.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock();
        cache.last_timestamp = 0;
        cache.badges.clear();
    }
}
