//! Hyprland command-socket client.
//!
//! One-shot request/response over `.socket.sock`: the live window list
//! (`j/clients`) and dispatch commands (focus, raise, close). This is the
//! write side of the compositor interface; the event socket in
//! `ipc_listener` is the read side.

use crate::error::{HyprtaskError, Result};
use crate::events::Window;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};

/// Command socket path: `{XDG_RUNTIME_DIR}/hypr/{HYPRLAND_INSTANCE_SIGNATURE}/.socket.sock`.
pub fn command_socket_path_from_env() -> Result<PathBuf> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| HyprtaskError::MissingEnvironment("XDG_RUNTIME_DIR".to_string()))?;
    let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").map_err(|_| {
        HyprtaskError::MissingEnvironment("HYPRLAND_INSTANCE_SIGNATURE".to_string())
    })?;

    Ok(Path::new(&runtime_dir)
        .join("hypr")
        .join(signature)
        .join(".socket.sock"))
}

/// Anything that can produce the current window list. The detector pulls
/// from this on every recomputation; tests substitute a stub.
#[async_trait]
pub trait WindowSource: Send + Sync {
    async fn fetch_windows(&self) -> Result<Vec<Window>>;
}

pub struct HyprctlClient {
    socket_path: PathBuf,
}

impl HyprctlClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(command_socket_path_from_env()?))
    }

    async fn request(&self, command: &str) -> Result<String> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        stream.write_all(command.as_bytes()).await?;
        stream.shutdown().await?;

        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        Ok(response)
    }

    /// Current window list, `hyprctl -j clients` equivalent.
    pub async fn clients(&self) -> Result<Vec<Window>> {
        let raw = self.request("j/clients").await?;
        let windows: Vec<Window> = serde_json::from_str(&raw)?;
        debug!("fetched {} windows from compositor", windows.len());
        Ok(windows)
    }

    /// Issue a single dispatcher command, e.g. `focuswindow address:0x...`.
    pub async fn dispatch(&self, action: &str) -> Result<()> {
        let reply = self.request(&format!("dispatch {action}")).await?;
        if reply.trim() == "ok" {
            Ok(())
        } else {
            Err(HyprtaskError::Protocol(format!(
                "dispatch {action}: {}",
                reply.trim()
            )))
        }
    }

    /// Focus every window in the list and raise it. Per-window failures are
    /// logged and skipped so the rest of the list is still handled.
    pub async fn focus_windows(&self, windows: &[Window]) {
        for window in windows {
            if window.address.is_empty() {
                warn!("window without address, cannot focus: {}", window);
                continue;
            }
            if let Err(e) = self
                .dispatch(&format!("focuswindow address:{}", window.address))
                .await
            {
                warn!("failed to focus {}: {}", window.address, e);
                continue;
            }
            if let Err(e) = self
                .dispatch(&format!("alterzorder top,address:{}", window.address))
                .await
            {
                debug!("failed to raise {}: {}", window.address, e);
            }
        }
    }

    /// Ask the compositor to close every window in the list.
    pub async fn close_windows(&self, windows: &[Window]) {
        for window in windows {
            if window.address.is_empty() {
                warn!("window without address, cannot close: {}", window);
                continue;
            }
            if let Err(e) = self
                .dispatch(&format!("closewindow address:{}", window.address))
                .await
            {
                warn!("failed to close {}: {}", window.address, e);
            }
        }
    }
}

#[async_trait]
impl WindowSource for HyprctlClient {
    async fn fetch_windows(&self) -> Result<Vec<Window>> {
        self.clients().await
    }
}
