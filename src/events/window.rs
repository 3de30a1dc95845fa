use serde::{Deserialize, Serialize};
use std::fmt;

/// A window as reported by the window manager.
///
/// Every field except `title` is fixed at creation time; `title` follows the
/// window while it is open. The window manager owns the window; this crate
/// only observes it, keyed by `address`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    #[serde(default)]
    pub address: String,
    #[serde(default, rename = "initialTitle")]
    pub initial_title: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "initialClass")]
    pub initial_class: String,
    #[serde(default, rename = "class")]
    pub class_name: String,
    /// Wayland toplevel app id. Not present in hyprctl `j/clients` output,
    /// but embedders tracking toplevels directly can populate it.
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub pid: Option<i32>,
}

impl Window {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_initial_title(mut self, title: impl Into<String>) -> Self {
        self.initial_title = title.into();
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        self.initial_class = class.clone();
        self.class_name = class;
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class_name.is_empty() {
            write!(f, "[{}] \"{}\"", self.address, self.title)
        } else {
            write!(f, "[{}] \"{}\" ({})", self.address, self.title, self.class_name)
        }
    }
}
