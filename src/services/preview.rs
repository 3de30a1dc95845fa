//! Hover-preview scheduling with keyed cancellable timers.
//!
//! A taskbar shows a window-list popover after the pointer lingers on an
//! item and hides it shortly after the pointer leaves. Both delays are
//! timers keyed by application id; re-entering an item cancels its pending
//! hide, and a pending show suppresses hide scheduling so quick
//! leave/enter jitter never tears the popover down.

use crate::config::PreviewConfig;
use crate::Window;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Popover side effects. The scheduler decides when; the implementor
/// renders.
pub trait PreviewActions: Send + Sync {
    fn show(&self, app_id: &str, windows: &[Window], app_name: &str, position: Option<(i32, i32)>);
    fn hide(&self, app_id: &str);
}

struct PreviewInner {
    actions: Arc<dyn PreviewActions>,
    config: PreviewConfig,
    show_timers: DashMap<String, JoinHandle<()>>,
    hide_timers: DashMap<String, JoinHandle<()>>,
    visible: DashSet<String>,
}

#[derive(Clone)]
pub struct PreviewScheduler {
    inner: Arc<PreviewInner>,
}

impl PreviewScheduler {
    pub fn new(actions: Arc<dyn PreviewActions>, config: PreviewConfig) -> Self {
        Self {
            inner: Arc::new(PreviewInner {
                actions,
                config,
                show_timers: DashMap::new(),
                hide_timers: DashMap::new(),
                visible: DashSet::new(),
            }),
        }
    }

    /// Show the popover now. At most one popover is live per item, so a
    /// popover already visible for this item is torn down first. Popovers
    /// for other items are untouched; their own hide timers govern them.
    pub fn show_preview(
        &self,
        app_id: &str,
        windows: &[Window],
        app_name: &str,
        position: Option<(i32, i32)>,
    ) {
        if windows.is_empty() {
            debug!("no windows for {}, preview skipped", app_id);
            return;
        }
        self.cancel_hide(app_id);

        if self.inner.visible.remove(app_id).is_some() {
            self.inner.actions.hide(app_id);
        }

        self.inner.actions.show(app_id, windows, app_name, position);
        self.inner.visible.insert(app_id.to_string());
    }

    /// Arm the hover delay for an item. A newer hover restarts the timer.
    pub fn schedule_show(
        &self,
        app_id: &str,
        windows: Vec<Window>,
        app_name: String,
        position: Option<(i32, i32)>,
    ) {
        self.cancel_show(app_id);
        self.cancel_hide(app_id);
        if windows.is_empty() {
            return;
        }

        let delay = Duration::from_millis(self.inner.config.hover_delay_ms);
        let inner = self.inner.clone();
        let key = app_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.show_timers.remove(&key);
            PreviewScheduler { inner: inner.clone() }.show_preview(
                &key,
                &windows,
                &app_name,
                position,
            );
        });
        self.inner.show_timers.insert(app_id.to_string(), handle);
    }

    /// Arm the hide delay for an item. Ignored while a show is still
    /// pending for the same item.
    pub fn schedule_hide(&self, app_id: &str) {
        if self.inner.show_timers.contains_key(app_id) {
            return;
        }
        self.cancel_hide(app_id);

        let delay = Duration::from_millis(self.inner.config.hide_delay_ms);
        let inner = self.inner.clone();
        let key = app_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.hide_timers.remove(&key);
            if inner.visible.remove(&key).is_some() {
                inner.actions.hide(&key);
            }
        });
        self.inner.hide_timers.insert(app_id.to_string(), handle);
    }

    /// Cancel a pending show. No-op for unknown items.
    pub fn cancel_show(&self, app_id: &str) {
        if let Some((_, handle)) = self.inner.show_timers.remove(app_id) {
            handle.abort();
        }
    }

    /// Cancel a pending hide. No-op for unknown items.
    pub fn cancel_hide(&self, app_id: &str) {
        if let Some((_, handle)) = self.inner.hide_timers.remove(app_id) {
            handle.abort();
        }
    }

    pub fn is_visible(&self, app_id: &str) -> bool {
        self.inner.visible.contains(app_id)
    }

    pub fn is_show_pending(&self, app_id: &str) -> bool {
        self.inner.show_timers.contains_key(app_id)
    }

    pub fn is_hide_pending(&self, app_id: &str) -> bool {
        self.inner.hide_timers.contains_key(app_id)
    }

    /// Abort every timer and hide everything still visible.
    pub fn cleanup(&self) {
        for entry in self.inner.show_timers.iter() {
            entry.value().abort();
        }
        self.inner.show_timers.clear();
        for entry in self.inner.hide_timers.iter() {
            entry.value().abort();
        }
        self.inner.hide_timers.clear();

        let visible: Vec<String> = self.inner.visible.iter().map(|id| id.clone()).collect();
        self.inner.visible.clear();
        for id in visible {
            self.inner.actions.hide(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingActions {
        events: Mutex<Vec<String>>,
    }

    impl RecordingActions {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl PreviewActions for RecordingActions {
        fn show(&self, app_id: &str, windows: &[Window], _name: &str, _pos: Option<(i32, i32)>) {
            self.events
                .lock()
                .push(format!("show {} ({})", app_id, windows.len()));
        }

        fn hide(&self, app_id: &str) {
            self.events.lock().push(format!("hide {app_id}"));
        }
    }

    fn scheduler(hover_ms: u64, hide_ms: u64) -> (Arc<RecordingActions>, PreviewScheduler) {
        let actions = Arc::new(RecordingActions::default());
        let config = PreviewConfig {
            hover_delay_ms: hover_ms,
            hide_delay_ms: hide_ms,
        };
        (actions.clone(), PreviewScheduler::new(actions, config))
    }

    #[tokio::test]
    async fn hide_is_suppressed_while_show_is_pending() {
        let (actions, scheduler) = scheduler(30, 10);
        scheduler.schedule_show("firefox", vec![Window::new("0x1")], "Firefox".into(), None);
        scheduler.schedule_hide("firefox");
        assert!(!scheduler.is_hide_pending("firefox"));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(actions.events(), vec!["show firefox (1)"]);
        assert!(scheduler.is_visible("firefox"));
    }

    #[tokio::test]
    async fn reentry_cancels_the_pending_hide() {
        let (actions, scheduler) = scheduler(10, 30);
        scheduler.show_preview("firefox", &[Window::new("0x1")], "Firefox", None);
        scheduler.schedule_hide("firefox");
        assert!(scheduler.is_hide_pending("firefox"));

        scheduler.cancel_hide("firefox");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(actions.events(), vec!["show firefox (1)"]);
        assert!(scheduler.is_visible("firefox"));
    }

    #[tokio::test]
    async fn hide_fires_after_the_delay() {
        let (actions, scheduler) = scheduler(10, 20);
        scheduler.show_preview("firefox", &[Window::new("0x1")], "Firefox", None);
        scheduler.schedule_hide("firefox");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(actions.events(), vec!["show firefox (1)", "hide firefox"]);
        assert!(!scheduler.is_visible("firefox"));
    }

    #[tokio::test]
    async fn reshowing_an_item_tears_down_its_live_popover_first() {
        let (actions, scheduler) = scheduler(10, 10);
        scheduler.show_preview("firefox", &[Window::new("0x1")], "Firefox", None);
        scheduler.show_preview("firefox", &[Window::new("0x1")], "Firefox", None);

        assert_eq!(
            actions.events(),
            vec!["show firefox (1)", "hide firefox", "show firefox (1)"]
        );
        assert!(scheduler.is_visible("firefox"));
    }

    #[tokio::test]
    async fn popovers_for_different_items_are_independent() {
        let (actions, scheduler) = scheduler(10, 10);
        scheduler.show_preview("firefox", &[Window::new("0x1")], "Firefox", None);
        scheduler.show_preview("kitty", &[Window::new("0x2")], "Kitty", None);

        assert_eq!(actions.events(), vec!["show firefox (1)", "show kitty (1)"]);
        assert!(scheduler.is_visible("firefox"));
        assert!(scheduler.is_visible("kitty"));
    }

    #[tokio::test]
    async fn empty_window_list_shows_nothing() {
        let (actions, scheduler) = scheduler(5, 5);
        scheduler.show_preview("firefox", &[], "Firefox", None);
        scheduler.schedule_show("firefox", vec![], "Firefox".into(), None);
        assert!(!scheduler.is_show_pending("firefox"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(actions.events().is_empty());
    }

    #[tokio::test]
    async fn cancel_for_unknown_item_is_a_no_op() {
        let (_, scheduler) = scheduler(5, 5);
        scheduler.cancel_show("nope");
        scheduler.cancel_hide("nope");
    }

    #[tokio::test]
    async fn cleanup_aborts_timers_and_hides_popovers() {
        let (actions, scheduler) = scheduler(50, 50);
        scheduler.show_preview("firefox", &[Window::new("0x1")], "Firefox", None);
        scheduler.schedule_show("kitty", vec![Window::new("0x2")], "Kitty".into(), None);

        scheduler.cleanup();
        assert!(!scheduler.is_show_pending("kitty"));
        assert!(!scheduler.is_visible("firefox"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(actions.events(), vec!["show firefox (1)", "hide firefox"]);
    }
}
