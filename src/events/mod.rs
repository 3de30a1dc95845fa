pub mod app;
pub mod window;

pub use app::{AppAction, Application};
pub use window::Window;

use std::fmt;
use std::time::Instant;

/// Raw record from the Hyprland event socket: one `eventType>>payload` line.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub event: String,
    pub payload: String,
    pub received: Instant,
}

impl RawEvent {
    pub fn new(event: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: payload.into(),
            received: Instant::now(),
        }
    }

    /// Split a wire line on the first `>>`. Lines without the delimiter are
    /// not events and yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let (event, payload) = line.split_once(">>")?;
        Some(Self::new(event, payload))
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}>>{} ({}ms ago)",
            self.event,
            self.payload,
            self.received.elapsed().as_millis()
        )
    }
}
