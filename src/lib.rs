//! Window-state synchronization and application matching for a Hyprland
//! taskbar.
//!
//! The crate listens to the compositor's event socket, mirrors the live
//! window list, groups windows by application with per-document splitting
//! for multi-profile apps, and feeds badge counts and hover previews from
//! the resulting snapshots.

pub mod config;
pub mod error;
pub mod events;
pub mod matcher;
pub mod services;

pub use config::Config;
pub use error::{HyprtaskError, Result};
pub use events::{AppAction, Application, RawEvent, Window};
pub use matcher::{AppGroup, GroupKey};
pub use services::badges::{BadgeCounter, BadgeInfo};
pub use services::detector::{SubscriptionId, WindowState, WindowStateDetector};
pub use services::hyprctl::{HyprctlClient, WindowSource};
pub use services::icons::{IconLookup, IconResolver, NoIconLookup};
pub use services::ipc_listener::EventListener;
pub use services::preview::{PreviewActions, PreviewScheduler};
pub use services::registry::{ApplicationRegistry, DesktopFileRegistry, StaticRegistry};
