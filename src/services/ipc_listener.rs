//! Hyprland event-socket listener.
//!
//! Owns the blocking connection to `.socket2.sock` on a dedicated thread and
//! forwards raw `event>>payload` records into a channel drained by the event
//! loop that owns the detector. The thread never touches shared state
//! directly; the stop flag is the only cross-thread signal.

use crate::error::{HyprtaskError, Result};
use crate::events::RawEvent;
use parking_lot::Mutex;
use std::io::{BufRead, BufReader};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Event socket path: `{XDG_RUNTIME_DIR}/hypr/{HYPRLAND_INSTANCE_SIGNATURE}/.socket2.sock`.
/// Missing environment means the feature is unavailable, not retryable.
pub fn socket_path_from_env() -> Result<PathBuf> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| HyprtaskError::MissingEnvironment("XDG_RUNTIME_DIR".to_string()))?;
    let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").map_err(|_| {
        HyprtaskError::MissingEnvironment("HYPRLAND_INSTANCE_SIGNATURE".to_string())
    })?;

    Ok(Path::new(&runtime_dir)
        .join("hypr")
        .join(signature)
        .join(".socket2.sock"))
}

pub struct EventListener {
    socket_path: PathBuf,
    events: UnboundedSender<RawEvent>,
    stop: Arc<AtomicBool>,
    // reader-side clone of the stream, kept so stop() can unblock the read
    stream: Arc<Mutex<Option<UnixStream>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventListener {
    pub fn new(socket_path: PathBuf, events: UnboundedSender<RawEvent>) -> Self {
        Self {
            socket_path,
            events,
            stop: Arc::new(AtomicBool::new(false)),
            stream: Arc::new(Mutex::new(None)),
            thread: Mutex::new(None),
        }
    }

    pub fn from_env(events: UnboundedSender<RawEvent>) -> Result<Self> {
        Ok(Self::new(socket_path_from_env()?, events))
    }

    /// Spawn the reader thread. Idempotent while the thread is alive.
    /// Connect failures end the thread silently; the owner must create a
    /// fresh listener to get another connection.
    pub fn start(&self) {
        let mut thread = self.thread.lock();
        if thread.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        self.stop.store(false, Ordering::SeqCst);
        let path = self.socket_path.clone();
        let events = self.events.clone();
        let stop = Arc::clone(&self.stop);
        let stream = Arc::clone(&self.stream);
        *thread = Some(std::thread::spawn(move || {
            listener_thread(path, events, stop, stream)
        }));
        info!("hyprland event listener started");
    }

    /// Signal the thread, unblock its read and join it. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
        info!("hyprland event listener stopped");
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listener_thread(
    path: PathBuf,
    events: UnboundedSender<RawEvent>,
    stop: Arc<AtomicBool>,
    shared: Arc<Mutex<Option<UnixStream>>>,
) {
    let stream = match UnixStream::connect(&path) {
        Ok(stream) => stream,
        Err(e) => {
            debug!("failed to connect to {:?}: {}", path, e);
            return;
        }
    };
    debug!("connected to hyprland event socket at {:?}", path);

    if let Ok(clone) = stream.try_clone() {
        *shared.lock() = Some(clone);
    }
    // stop() may have raced us before the clone was stored
    if stop.load(Ordering::SeqCst) {
        *shared.lock() = None;
        return;
    }

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    while !stop.load(Ordering::SeqCst) {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break, // EOF, remote closed
            Ok(_) => {
                if let Some(event) = RawEvent::parse(line.trim_end()) {
                    if events.send(event).is_err() {
                        break; // receiving side is gone
                    }
                }
            }
            Err(e) => {
                debug!("event socket read failed: {}", e);
                break;
            }
        }
    }

    *shared.lock() = None;
    debug!("exiting hyprland event listener thread");
}
