//! Application catalog backing the matcher.
//!
//! The grouping pipeline matches windows against a list of known
//! applications. [`DesktopFileRegistry`] builds that list from `.desktop`
//! entries on disk; [`StaticRegistry`] serves a fixed list for tests and
//! embedding.

use crate::events::{AppAction, Application};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait ApplicationRegistry: Send + Sync {
    fn applications(&self) -> Vec<Application>;
}

/// Fixed application list.
pub struct StaticRegistry {
    apps: RwLock<Vec<Application>>,
}

impl StaticRegistry {
    pub fn new(apps: Vec<Application>) -> Self {
        Self {
            apps: RwLock::new(apps),
        }
    }

    pub fn replace(&self, apps: Vec<Application>) {
        *self.apps.write() = apps;
    }
}

impl ApplicationRegistry for StaticRegistry {
    fn applications(&self) -> Vec<Application> {
        self.apps.read().clone()
    }
}

/// Applications discovered from `.desktop` files. The scan is lazy and
/// cached; [`DesktopFileRegistry::reload`] rescans the directories.
pub struct DesktopFileRegistry {
    dirs: Vec<PathBuf>,
    pinned: RwLock<HashSet<String>>,
    cache: RwLock<Option<Vec<Application>>>,
}

impl DesktopFileRegistry {
    pub fn new() -> Self {
        let mut dirs = Vec::new();
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(Path::new(&home).join(".local/share/applications"));
        }
        if let Ok(xdg_dirs) = std::env::var("XDG_DATA_DIRS") {
            for dir in xdg_dirs.split(':').filter(|d| !d.is_empty()) {
                dirs.push(Path::new(dir).join("applications"));
            }
        } else {
            dirs.push(PathBuf::from("/usr/local/share/applications"));
            dirs.push(PathBuf::from("/usr/share/applications"));
        }
        Self::with_dirs(dirs)
    }

    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            pinned: RwLock::new(HashSet::new()),
            cache: RwLock::new(None),
        }
    }

    pub fn set_pinned(&self, ids: impl IntoIterator<Item = String>) {
        *self.pinned.write() = ids.into_iter().collect();
        *self.cache.write() = None;
    }

    pub fn pin(&self, id: &str) {
        self.pinned.write().insert(id.to_string());
        *self.cache.write() = None;
    }

    pub fn unpin(&self, id: &str) {
        self.pinned.write().remove(id);
        *self.cache.write() = None;
    }

    pub fn reload(&self) {
        *self.cache.write() = None;
    }

    fn scan(&self) -> Vec<Application> {
        let pinned = self.pinned.read();
        let mut seen = HashSet::new();
        let mut apps = Vec::new();
        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                // Earlier directories shadow later ones, XDG precedence.
                if !seen.insert(id.to_string()) {
                    continue;
                }
                if let Some(app) = parse_desktop_file(&path, id, pinned.contains(id)) {
                    apps.push(app);
                }
            }
        }
        apps.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("registry scan found {} applications", apps.len());
        apps
    }
}

impl Default for DesktopFileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationRegistry for DesktopFileRegistry {
    fn applications(&self) -> Vec<Application> {
        {
            let cache = self.cache.read();
            if let Some(apps) = cache.as_ref() {
                return apps.clone();
            }
        }
        let apps = self.scan();
        *self.cache.write() = Some(apps.clone());
        apps
    }
}

fn parse_desktop_file(path: &Path, id: &str, pinned: bool) -> Option<Application> {
    let content = std::fs::read_to_string(path).ok()?;

    let mut name = None;
    let mut icon = None;
    let mut no_display = false;
    let mut actions = Vec::new();
    let mut current_action: Option<AppAction> = None;
    let mut in_main_group = false;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            if let Some(action) = current_action.take() {
                actions.push(action);
            }
            in_main_group = line == "[Desktop Entry]";
            if line.starts_with("[Desktop Action ") {
                current_action = Some(AppAction {
                    name: String::new(),
                    command: None,
                });
            }
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if let Some(action) = current_action.as_mut() {
            match key {
                "Name" => action.name = value.to_string(),
                "Exec" => action.command = Some(value.to_string()),
                _ => {}
            }
        } else if in_main_group {
            match key {
                "Name" if name.is_none() => name = Some(value.to_string()),
                "Icon" if icon.is_none() && !value.is_empty() => icon = Some(value.to_string()),
                "NoDisplay" => no_display = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
    }
    if let Some(action) = current_action.take() {
        actions.push(action);
    }

    if no_display {
        return None;
    }
    let name = name?;
    let mut app = Application::new(id, &name);
    app.icon = icon;
    app.is_pinned = pinned;
    app.actions = actions.into_iter().filter(|a| !a.name.is_empty()).collect();
    Some(app)
}
