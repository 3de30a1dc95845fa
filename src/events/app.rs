use serde::{Deserialize, Serialize};
use std::fmt;

/// An entry from the application registry (a desktop-entry database or an
/// embedder-supplied list). The registry owns these records; this crate only
/// reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub actions: Vec<AppAction>,
}

/// A secondary launch target from a `[Desktop Action ...]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAction {
    pub name: String,
    pub command: Option<String>,
}

impl Application {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.is_pinned = pinned;
        self
    }

    pub fn with_actions(mut self, actions: Vec<AppAction>) -> Self {
        self.actions = actions;
        self
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trip() {
        let app = Application::new("firefox", "Firefox")
            .with_icon("firefox")
            .pinned(true)
            .with_actions(vec![AppAction {
                name: "New Private Window".to_string(),
                command: Some("firefox --private-window".to_string()),
            }]);

        assert_eq!(app.id, "firefox");
        assert!(app.is_pinned);
        assert_eq!(app.actions.len(), 1);
        assert_eq!(app.to_string(), "Firefox (firefox)");
    }
}
