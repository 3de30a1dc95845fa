//! Icon resolution from desktop entries and icon themes.
//!
//! Walks XDG application and icon directories, maps window titles to
//! `.desktop` files by their localized `Name=` entries and resolves the
//! entry's `Icon=` value to a file on disk. All lookups are cached;
//! [`IconResolver::clear_cache`] drops the caches after theme changes.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Title-based icon override used during window grouping. A group formed
/// around a distinct document title can carry its own icon when some
/// desktop entry's name matches that title.
pub trait IconLookup: Send + Sync {
    fn icon_for_window_title(&self, title: &str) -> Option<String>;
}

/// Lookup that never resolves anything. For headless setups and tests.
pub struct NoIconLookup;

impl IconLookup for NoIconLookup {
    fn icon_for_window_title(&self, _title: &str) -> Option<String> {
        None
    }
}

const ICON_EXTENSIONS: [&str; 3] = ["png", "svg", "xpm"];

pub struct IconResolver {
    desktop_dirs: Vec<PathBuf>,
    icon_dirs: Vec<PathBuf>,
    theme: OnceCell<String>,
    /// Lowercased desktop-entry display name -> .desktop path.
    desktop_index: RwLock<Option<HashMap<String, PathBuf>>>,
    /// Icon name -> resolved file path (or a recorded miss).
    icon_cache: RwLock<HashMap<String, Option<String>>>,
}

impl IconResolver {
    pub fn new() -> Self {
        let mut desktop_dirs = Vec::new();
        if let Ok(home) = std::env::var("HOME") {
            desktop_dirs.push(Path::new(&home).join(".local/share/applications"));
        }
        if let Ok(xdg_dirs) = std::env::var("XDG_DATA_DIRS") {
            for dir in xdg_dirs.split(':').filter(|d| !d.is_empty()) {
                desktop_dirs.push(Path::new(dir).join("applications"));
            }
        } else {
            desktop_dirs.push(PathBuf::from("/usr/local/share/applications"));
            desktop_dirs.push(PathBuf::from("/usr/share/applications"));
        }

        let mut icon_dirs = Vec::new();
        if let Ok(home) = std::env::var("HOME") {
            icon_dirs.push(Path::new(&home).join(".local/share/icons"));
            icon_dirs.push(Path::new(&home).join(".icons"));
        }
        icon_dirs.push(PathBuf::from("/usr/share/icons"));

        Self {
            desktop_dirs,
            icon_dirs,
            theme: OnceCell::new(),
            desktop_index: RwLock::new(None),
            icon_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver over explicit directories with a fixed theme. For tests.
    pub fn with_paths(desktop_dirs: Vec<PathBuf>, icon_dirs: Vec<PathBuf>, theme: &str) -> Self {
        Self {
            desktop_dirs,
            icon_dirs,
            theme: OnceCell::with_value(theme.to_string()),
            desktop_index: RwLock::new(None),
            icon_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Active icon theme name. Tries the desktop environment's settings
    /// stores in turn and falls back to hicolor.
    pub fn current_theme(&self) -> &str {
        self.theme.get_or_init(|| {
            detect_theme().unwrap_or_else(|| "hicolor".to_string())
        })
    }

    /// Resolve an icon for a desktop-entry identifier via its `Icon=` line.
    pub fn icon_for_app(&self, app_id: &str) -> Option<String> {
        if let Some(cached) = self.icon_cache.read().get(app_id) {
            return cached.clone();
        }
        let resolved = self
            .find_desktop_file_by_id(app_id)
            .and_then(|path| self.icon_from_desktop_file(&path));
        self.icon_cache
            .write()
            .insert(app_id.to_string(), resolved.clone());
        resolved
    }

    /// Look an icon name up in the active theme, then hicolor, then the
    /// unthemed pixmap directory. Absolute paths pass through untouched.
    pub fn find_icon_by_name(&self, icon_name: &str) -> Option<String> {
        if icon_name.starts_with('/') && Path::new(icon_name).exists() {
            return Some(icon_name.to_string());
        }
        if let Some(cached) = self.icon_cache.read().get(icon_name) {
            return cached.clone();
        }

        let mut themes = vec![self.current_theme().to_string()];
        if themes[0] != "hicolor" {
            themes.push("hicolor".to_string());
        }

        let mut resolved = None;
        'outer: for theme in &themes {
            for base in &self.icon_dirs {
                let theme_dir = base.join(theme);
                if let Some(path) = find_icon_in_dir(&theme_dir, icon_name) {
                    resolved = Some(path);
                    break 'outer;
                }
            }
        }
        if resolved.is_none() {
            for ext in ICON_EXTENSIONS {
                let candidate = Path::new("/usr/share/pixmaps").join(format!("{icon_name}.{ext}"));
                if candidate.exists() {
                    resolved = Some(candidate.to_string_lossy().into_owned());
                    break;
                }
            }
        }

        self.icon_cache
            .write()
            .insert(icon_name.to_string(), resolved.clone());
        resolved
    }

    pub fn clear_cache(&self) {
        *self.desktop_index.write() = None;
        self.icon_cache.write().clear();
        debug!("icon caches cleared");
    }

    fn find_desktop_file_by_id(&self, app_id: &str) -> Option<PathBuf> {
        for dir in &self.desktop_dirs {
            let candidate = dir.join(format!("{app_id}.desktop"));
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }

    /// Case-insensitive match of a window title against desktop-entry
    /// display names, localized variants included.
    fn find_desktop_file_by_name(&self, name: &str) -> Option<PathBuf> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        {
            let index = self.desktop_index.read();
            if let Some(index) = index.as_ref() {
                return index.get(&needle).cloned();
            }
        }
        let index = self.build_desktop_index();
        let found = index.get(&needle).cloned();
        *self.desktop_index.write() = Some(index);
        found
    }

    fn build_desktop_index(&self) -> HashMap<String, PathBuf> {
        let mut index = HashMap::new();
        for dir in &self.desktop_dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                let Ok(content) = std::fs::read_to_string(&path) else {
                    continue;
                };
                for line in content.lines() {
                    let line = line.trim();
                    if let Some(value) = line.strip_prefix("Name=") {
                        index
                            .entry(value.trim().to_lowercase())
                            .or_insert_with(|| path.clone());
                    } else if line.starts_with("Name[") {
                        if let Some((_, value)) = line.split_once('=') {
                            index
                                .entry(value.trim().to_lowercase())
                                .or_insert_with(|| path.clone());
                        }
                    } else if line.starts_with('[') && line != "[Desktop Entry]" {
                        // Localized names only live in the main group.
                        break;
                    }
                }
            }
        }
        debug!("indexed {} desktop entry names", index.len());
        index
    }

    fn icon_from_desktop_file(&self, path: &Path) -> Option<String> {
        let content = std::fs::read_to_string(path).ok()?;
        let icon_name = content
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("Icon="))?
            .trim();
        if icon_name.is_empty() {
            return None;
        }
        self.find_icon_by_name(icon_name)
    }
}

impl Default for IconResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IconLookup for IconResolver {
    fn icon_for_window_title(&self, title: &str) -> Option<String> {
        let path = self.find_desktop_file_by_name(title)?;
        self.icon_from_desktop_file(&path)
    }
}

/// Recursive search for `{name}.{png,svg,xpm}` under a theme directory.
fn find_icon_in_dir(dir: &Path, icon_name: &str) -> Option<String> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str());
        let ext = path.extension().and_then(|e| e.to_str());
        if stem == Some(icon_name) && ext.is_some_and(|e| ICON_EXTENSIONS.contains(&e)) {
            return Some(path.to_string_lossy().into_owned());
        }
    }
    subdirs
        .into_iter()
        .find_map(|sub| find_icon_in_dir(&sub, icon_name))
}

fn detect_theme() -> Option<String> {
    if let Ok(output) = Command::new("gsettings")
        .args(["get", "org.gnome.desktop.interface", "icon-theme"])
        .output()
    {
        if output.status.success() {
            let theme = String::from_utf8_lossy(&output.stdout)
                .trim()
                .trim_matches('\'')
                .to_string();
            if !theme.is_empty() {
                return Some(theme);
            }
        }
    }

    let home = std::env::var("HOME").ok()?;
    for (file, section, key) in [
        (".config/kdeglobals", "[Icons]", "Theme"),
        (".config/gtk-3.0/settings.ini", "[Settings]", "gtk-icon-theme-name"),
    ] {
        let path = Path::new(&home).join(file);
        if let Some(theme) = ini_value(&path, section, key) {
            return Some(theme);
        }
    }
    None
}

/// Minimal ini lookup, enough for kdeglobals and gtk settings.
fn ini_value(path: &Path, section: &str, key: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let mut in_section = false;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_section = line == section;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            if k.trim() == key && !v.trim().is_empty() {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}
