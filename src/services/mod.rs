pub mod badges;
pub mod detector;
pub mod hyprctl;
pub mod icons;
pub mod ipc_listener;
pub mod preview;
pub mod registry;

pub use badges::BadgeCounter;
pub use detector::WindowStateDetector;
pub use hyprctl::HyprctlClient;
pub use icons::IconResolver;
pub use ipc_listener::EventListener;
pub use preview::PreviewScheduler;
