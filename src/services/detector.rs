//! Window state detection and change notification.
//!
//! Subscribers register callbacks and receive immutable state snapshots.
//! While at least one subscriber exists, compositor events stream in from
//! the event socket; each burst of events collapses into one debounced
//! recomputation that fetches the live window list, regroups it and
//! notifies everyone.

use crate::config::{DetectorConfig, MatcherConfig};
use crate::error::Result;
use crate::events::RawEvent;
use crate::matcher::{self, AppGroup, GroupKey};
use crate::services::hyprctl::WindowSource;
use crate::services::icons::IconLookup;
use crate::services::ipc_listener::EventListener;
use crate::services::registry::ApplicationRegistry;
use crate::Window;
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Immutable snapshot of the desktop. `timestamp` is strictly increasing
/// across recomputations; zero means no recomputation has happened yet.
#[derive(Debug, Clone, Default)]
pub struct WindowState {
    pub windows: Vec<Window>,
    pub app_groups: HashMap<GroupKey, AppGroup>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(Arc<WindowState>) + Send + Sync>;

struct ListenerHandle {
    listener: EventListener,
    pump: JoinHandle<()>,
}

struct DetectorInner {
    source: Arc<dyn WindowSource>,
    registry: Arc<dyn ApplicationRegistry>,
    icons: Arc<dyn IconLookup>,
    detector_cfg: DetectorConfig,
    matcher_cfg: MatcherConfig,
    state: RwLock<Arc<WindowState>>,
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    known_windows: DashSet<String>,
    debounce: Mutex<Option<JoinHandle<()>>>,
    listener: Mutex<Option<ListenerHandle>>,
    last_timestamp: AtomicU64,
    recomputes: AtomicU64,
}

#[derive(Clone)]
pub struct WindowStateDetector {
    inner: Arc<DetectorInner>,
}

impl WindowStateDetector {
    pub fn new(
        source: Arc<dyn WindowSource>,
        registry: Arc<dyn ApplicationRegistry>,
        icons: Arc<dyn IconLookup>,
        detector_cfg: DetectorConfig,
        matcher_cfg: MatcherConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DetectorInner {
                source,
                registry,
                icons,
                detector_cfg,
                matcher_cfg,
                state: RwLock::new(Arc::new(WindowState::default())),
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                known_windows: DashSet::new(),
                debounce: Mutex::new(None),
                listener: Mutex::new(None),
                last_timestamp: AtomicU64::new(0),
                recomputes: AtomicU64::new(0),
            }),
        }
    }

    /// Register a change callback. The callback is invoked immediately with
    /// the current snapshot, then on every recomputation until unsubscribed.
    /// The first subscriber starts the compositor event listener; if the
    /// listener cannot be constructed the registration is rolled back.
    pub fn subscribe(
        &self,
        callback: impl Fn(Arc<WindowState>) + Send + Sync + 'static,
    ) -> Result<SubscriptionId> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Subscriber = Arc::new(callback);
        self.inner.subscribers.insert(id, callback.clone());

        if self.inner.subscribers.len() == 1 {
            if let Err(e) = self.start_listener() {
                self.inner.subscribers.remove(&id);
                return Err(e);
            }
        }

        let snapshot = self.current_state();
        if catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
            warn!("subscriber {} panicked on initial delivery", id);
        }
        self.schedule_recompute("subscribe");
        Ok(SubscriptionId(id))
    }

    /// Remove a subscription. The last unsubscribe stops the listener.
    /// Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.inner.subscribers.remove(&id.0).is_none() {
            return;
        }
        if self.inner.subscribers.is_empty() {
            self.stop_listener();
        }
    }

    pub fn current_state(&self) -> Arc<WindowState> {
        self.inner.state.read().clone()
    }

    /// Recompute immediately, bypassing the debounce window.
    pub async fn refresh(&self) {
        recompute_and_notify(&self.inner).await;
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    /// Number of completed recomputations. Test observability.
    pub fn recompute_count(&self) -> u64 {
        self.inner.recomputes.load(Ordering::Relaxed)
    }

    /// Drop all subscribers, stop the listener and cancel pending work.
    pub fn cleanup(&self) {
        self.inner.subscribers.clear();
        self.stop_listener();
        if let Some(handle) = self.inner.debounce.lock().take() {
            handle.abort();
        }
        self.inner.known_windows.clear();
    }

    fn start_listener(&self) -> Result<()> {
        let mut slot = self.inner.listener.lock();
        if slot.is_some() {
            return Ok(());
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<RawEvent>();
        let listener = match &self.inner.detector_cfg.socket_path {
            Some(path) => EventListener::new(path.clone(), tx),
            None => EventListener::from_env(tx)?,
        };
        listener.start();

        let inner = self.inner.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_raw_event(&inner, event);
            }
        });

        *slot = Some(ListenerHandle { listener, pump });
        debug!("event listener started");
        Ok(())
    }

    fn stop_listener(&self) {
        if let Some(handle) = self.inner.listener.lock().take() {
            handle.listener.stop();
            handle.pump.abort();
            debug!("event listener stopped");
        }
    }

    fn schedule_recompute(&self, reason: &str) {
        schedule_recompute(&self.inner, reason);
    }
}

impl Drop for DetectorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.listener.stop();
            handle.pump.abort();
        }
        if let Some(handle) = self.debounce.get_mut().take() {
            handle.abort();
        }
    }
}

fn handle_raw_event(inner: &Arc<DetectorInner>, event: RawEvent) {
    match event.event.as_str() {
        "openwindow" => {
            // payload: address,workspace,class,title
            let address = event.payload.split(',').next().unwrap_or("").trim();
            if !address.is_empty() && inner.known_windows.insert(address.to_string()) {
                debug!("window opened: {}", address);
            }
        }
        "closewindow" => {
            let address = event.payload.trim();
            if inner.known_windows.remove(address).is_some() {
                debug!("window closed: {}", address);
            }
        }
        _ => {}
    }
    schedule_recompute(inner, &format!("ipc_{}", event.event));
}

/// Collapse event bursts: every call aborts the pending recomputation and
/// arms a fresh debounce timer.
fn schedule_recompute(inner: &Arc<DetectorInner>, reason: &str) {
    let delay = Duration::from_millis(inner.detector_cfg.debounce_ms);
    debug!("recompute scheduled ({})", reason);

    let mut pending = inner.debounce.lock();
    if let Some(handle) = pending.take() {
        handle.abort();
    }
    let task_inner = inner.clone();
    *pending = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        recompute_and_notify(&task_inner).await;
    }));
}

async fn recompute_and_notify(inner: &Arc<DetectorInner>) {
    let windows = match inner.source.fetch_windows().await {
        Ok(windows) => windows,
        Err(e) => {
            warn!("window fetch failed, keeping previous state: {}", e);
            return;
        }
    };
    let apps = inner.registry.applications();
    let app_groups = matcher::group_windows(&windows, &apps, inner.icons.as_ref(), &inner.matcher_cfg);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    // Strictly increasing even when the clock stalls within a millisecond.
    let timestamp = inner
        .last_timestamp
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
            Some(now.max(prev + 1))
        })
        .map(|prev| now.max(prev + 1))
        .unwrap_or(now);

    inner.known_windows.clear();
    for window in &windows {
        inner.known_windows.insert(window.address.clone());
    }

    let state = Arc::new(WindowState {
        windows,
        app_groups,
        timestamp,
    });
    *inner.state.write() = state.clone();
    inner.recomputes.fetch_add(1, Ordering::Relaxed);
    debug!(
        "state recomputed: {} windows, {} groups",
        state.windows.len(),
        state.app_groups.len()
    );

    // Clone the callbacks out before invoking so a callback that
    // subscribes or unsubscribes cannot deadlock on the map shard.
    let subscribers: Vec<(u64, Subscriber)> = inner
        .subscribers
        .iter()
        .map(|entry| (*entry.key(), entry.value().clone()))
        .collect();
    for (id, callback) in subscribers {
        let snapshot = state.clone();
        if catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
            warn!("subscriber {} panicked, continuing with the rest", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Application;
    use crate::services::icons::NoIconLookup;
    use crate::services::registry::StaticRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct StubSource {
        windows: RwLock<Vec<Window>>,
        fetches: AtomicUsize,
    }

    impl StubSource {
        fn new(windows: Vec<Window>) -> Self {
            Self {
                windows: RwLock::new(windows),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WindowSource for StubSource {
        async fn fetch_windows(&self) -> Result<Vec<Window>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.windows.read().clone())
        }
    }

    fn detector_with(
        source: Arc<StubSource>,
        apps: Vec<Application>,
        socket_path: Option<std::path::PathBuf>,
    ) -> WindowStateDetector {
        let detector_cfg = DetectorConfig {
            debounce_ms: 30,
            socket_path,
            command_socket_path: None,
        };
        WindowStateDetector::new(
            source,
            Arc::new(StaticRegistry::new(apps)),
            Arc::new(NoIconLookup),
            detector_cfg,
            MatcherConfig::default(),
        )
    }

    #[tokio::test]
    async fn listener_lifecycle_follows_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join(".socket2.sock");
        let _server = std::os::unix::net::UnixListener::bind(&socket).unwrap();

        let source = Arc::new(StubSource::new(vec![]));
        let detector = detector_with(source, vec![], Some(socket));

        assert!(!detector.is_listening());
        let a = detector.subscribe(|_| {}).unwrap();
        let b = detector.subscribe(|_| {}).unwrap();
        assert!(detector.is_listening());
        assert_eq!(detector.subscriber_count(), 2);

        detector.unsubscribe(a);
        assert!(detector.is_listening());
        detector.unsubscribe(b);
        assert!(!detector.is_listening());

        // Unknown id is a no-op.
        detector.unsubscribe(a);
    }

    #[tokio::test]
    async fn debounce_collapses_event_bursts() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join(".socket2.sock");
        let _server = std::os::unix::net::UnixListener::bind(&socket).unwrap();

        let source = Arc::new(StubSource::new(vec![Window::new("0x1").with_class("kitty")]));
        let notified = Arc::new(AtomicUsize::new(0));
        let detector = detector_with(source.clone(), vec![], Some(socket));

        let notified_cb = notified.clone();
        let sub = detector
            .subscribe(move |_| {
                notified_cb.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        // Initial synchronous delivery plus the debounced subscribe pass.
        tokio::time::sleep(Duration::from_millis(80)).await;
        let baseline_notifies = notified.load(Ordering::SeqCst);
        let baseline_recomputes = detector.recompute_count();
        assert_eq!(baseline_notifies, 2);

        for i in 0..5 {
            handle_raw_event(
                &detector.inner,
                RawEvent::new("openwindow", format!("0x{i},1,kitty,term")),
            );
        }
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(detector.recompute_count(), baseline_recomputes + 1);
        assert_eq!(notified.load(Ordering::SeqCst), baseline_notifies + 1);
        detector.unsubscribe(sub);
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join(".socket2.sock");
        let _server = std::os::unix::net::UnixListener::bind(&socket).unwrap();

        let source = Arc::new(StubSource::new(vec![]));
        let detector = detector_with(source, vec![], Some(socket));

        let _bad = detector.subscribe(|_| panic!("boom")).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        let _good = detector
            .subscribe(move |_| {
                seen_cb.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        detector.refresh().await;
        assert!(seen.load(Ordering::SeqCst) >= 2);
        detector.cleanup();
    }

    #[tokio::test]
    async fn refresh_groups_windows_end_to_end() {
        let windows = vec![
            Window::new("0x1")
                .with_class("firefox")
                .with_initial_title("Mozilla Firefox")
                .with_title("Mozilla Firefox"),
            Window::new("0x2")
                .with_class("firefox")
                .with_initial_title("Document.pdf — Firefox")
                .with_title("Document.pdf — Firefox"),
        ];
        let apps = vec![Application::new("firefox", "Firefox")];
        let source = Arc::new(StubSource::new(windows));
        let detector = detector_with(source, apps, None);

        detector.refresh().await;
        let state = detector.current_state();
        assert!(state.timestamp > 0);
        assert_eq!(state.windows.len(), 2);
        assert_eq!(state.app_groups.len(), 2);
        assert!(state.app_groups.contains_key("firefox:main"));
        assert!(state.app_groups.contains_key("firefox:Document.pdf — Firefox"));
    }

    #[tokio::test]
    async fn timestamps_are_strictly_increasing() {
        let source = Arc::new(StubSource::new(vec![]));
        let detector = detector_with(source, vec![], None);

        detector.refresh().await;
        let first = detector.current_state().timestamp;
        detector.refresh().await;
        let second = detector.current_state().timestamp;
        assert!(second > first);
    }
}
