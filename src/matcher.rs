//! Window ↔ application matching and grouping.
//!
//! Everything in this module is a pure function over window and application
//! records: no state beyond the read-only icon lookup, so repeated calls with
//! the same inputs are deterministic. The detector rebuilds groups from
//! scratch on every recomputation instead of patching them incrementally.

use crate::config::MatcherConfig;
use crate::events::{Application, Window};
use crate::services::icons::IconLookup;
use std::collections::HashMap;

pub type GroupKey = String;

/// One taskbar entity: an application plus the windows grouped under it.
/// Built fresh on every recomputation, never mutated in place.
#[derive(Debug, Clone)]
pub struct AppGroup {
    pub app: Application,
    pub windows: Vec<Window>,
    pub icon: Option<String>,
}

/// Lowercased, trimmed comparison form of an identifying string.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Does `window` belong to `app`?
///
/// Strict priority order, first hit wins. Exact identifier matches must
/// always outrank substring fallbacks: substring matching produces false
/// positives across unrelated applications with similar names.
pub fn window_matches_app(window: &Window, app: &Application) -> bool {
    let app_id = normalize(&app.id);
    let app_name = normalize(&app.name);

    let initial_title = normalize(&window.initial_title);
    let initial_class = normalize(&window.initial_class);
    let class_name = normalize(&window.class_name);
    let window_app_id = normalize(&window.app_id);
    let title = normalize(&window.title);

    // 1. initial title equals the application name
    if !initial_title.is_empty() && !app_name.is_empty() && initial_title == app_name {
        return true;
    }

    // 2. toplevel app id equals the application id
    if !window_app_id.is_empty() && window_app_id == app_id {
        return true;
    }

    // 3. initial class equals the application id
    if !initial_class.is_empty() && initial_class == app_id {
        return true;
    }

    // 4. current class equals the application id
    if !class_name.is_empty() && class_name == app_id {
        return true;
    }

    // 5. application name appears in the current title (fallback)
    if !title.is_empty() && !app_name.is_empty() && title.contains(&app_name) {
        return true;
    }

    // 6. application id appears in one of the class fields (fallback)
    if !app_id.is_empty() {
        if !class_name.is_empty() && class_name.contains(&app_id) {
            return true;
        }
        if !initial_class.is_empty() && initial_class.contains(&app_id) {
            return true;
        }
    }

    false
}

/// Resolve the application a window belongs to: exact title lookup first,
/// then class lookup. Returns `None` for windows no registry entry claims;
/// such windows are dropped from grouping entirely.
pub fn find_matching_app<'a>(window: &Window, apps: &'a [Application]) -> Option<&'a Application> {
    let initial_title = window.initial_title.trim();
    if !initial_title.is_empty() {
        if let Some(app) = app_by_title(initial_title, apps) {
            return Some(app);
        }
    }

    let class = if !window.class_name.trim().is_empty() {
        window.class_name.trim()
    } else {
        window.initial_class.trim()
    };
    if !class.is_empty() {
        if let Some(app) = app_by_class(class, apps) {
            return Some(app);
        }
    }

    None
}

fn app_by_title<'a>(title: &str, apps: &'a [Application]) -> Option<&'a Application> {
    let title = normalize(title);
    apps.iter()
        .find(|app| !app.name.is_empty() && normalize(&app.name) == title)
}

/// Class lookup prefers an exact id match (ignoring a `.desktop` suffix)
/// over a substring match; ties go to the shortest id, i.e. the most
/// specific identifier.
fn app_by_class<'a>(class: &str, apps: &'a [Application]) -> Option<&'a Application> {
    let class = normalize(class);
    if class.is_empty() {
        return None;
    }

    let mut exact: Vec<&Application> = Vec::new();
    let mut substring: Vec<&Application> = Vec::new();

    for app in apps {
        let app_id = normalize(&app.id);
        if app_id.is_empty() {
            continue;
        }

        let app_id_base = app_id.strip_suffix(".desktop").unwrap_or(&app_id);
        if app_id_base == class || app_id == class {
            exact.push(app);
        } else if app_id.contains(&class) {
            substring.push(app);
        }
    }

    exact
        .into_iter()
        .min_by_key(|app| app.id.len())
        .or_else(|| substring.into_iter().min_by_key(|app| app.id.len()))
}

/// Derive the grouping key splitting logical instances of one application.
///
/// Structural heuristic over title relationships, no hardcoded application
/// names:
/// - an initial title that is not a restatement of the app name keys a
///   separate group (`id:initialTitle`), e.g. distinct web-app windows;
/// - a current title that drifted substantially from the initial one keys
///   `id:currentTitle`;
/// - a title that restates the app name collapses into `id:main`;
/// - otherwise the bare application id.
pub fn group_key(window: &Window, app: &Application, config: &MatcherConfig) -> GroupKey {
    let initial_title = window.initial_title.trim();
    let current_title = window.title.trim();
    let initial_norm = normalize(initial_title);
    let current_norm = normalize(current_title);
    let app_name = normalize(&app.name);

    if !initial_norm.is_empty()
        && !is_name_restatement(&initial_norm, &app_name, config.distinct_title_threshold)
    {
        return format!("{}:{}", app.id, initial_title);
    }

    if !current_norm.is_empty()
        && !initial_norm.is_empty()
        && current_norm != initial_norm
        && current_norm.len() > config.distinct_title_threshold
        && !initial_norm.contains(&current_norm)
    {
        return format!("{}:{}", app.id, current_title);
    }

    if !initial_norm.is_empty() && (initial_norm == app_name || initial_norm.contains(&app_name)) {
        return format!("{}:main", app.id);
    }

    app.id.clone()
}

/// Is `title` just the application name again (possibly with short branding
/// around it, "Mozilla Firefox" for "Firefox"), as opposed to a document or
/// web-app title that happens to embed the name ("Document.pdf — Firefox")?
fn is_name_restatement(title: &str, app_name: &str, threshold: usize) -> bool {
    if title == app_name || app_name.contains(title) {
        return true;
    }
    if title.contains(app_name) {
        // the name is embedded: a restatement carries only a little extra
        return title.len().saturating_sub(app_name.len()) <= threshold;
    }
    false
}

/// Group windows by application. Windows with no matching application are
/// skipped, never parked in a catch-all bucket. Each window lands in exactly
/// one group.
pub fn group_windows(
    windows: &[Window],
    apps: &[Application],
    icons: &dyn IconLookup,
    config: &MatcherConfig,
) -> HashMap<GroupKey, AppGroup> {
    let mut groups: HashMap<GroupKey, AppGroup> = HashMap::new();

    for window in windows {
        let Some(app) = find_matching_app(window, apps) else {
            continue;
        };

        let key = group_key(window, app, config);

        // desktop-entry override discovered via the initial title wins over
        // the registry icon
        let initial_title = window.initial_title.trim();
        let icon = if initial_title.is_empty() {
            None
        } else {
            icons.icon_for_window_title(initial_title)
        }
        .or_else(|| app.icon.clone());

        let group = groups.entry(key).or_insert_with(|| AppGroup {
            app: app.clone(),
            windows: Vec::new(),
            icon: icon.clone(),
        });
        group.windows.push(window.clone());
        if group.icon.is_none() {
            group.icon = icon;
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::icons::NoIconLookup;
    use pretty_assertions::assert_eq;

    fn config() -> MatcherConfig {
        MatcherConfig::default()
    }

    #[test]
    fn exact_app_id_outranks_title_substring() {
        // window whose app_id names A but whose title substring-matches B
        let window = Window::new("0x1")
            .with_app_id("alacritty")
            .with_title("editor session");
        let a = Application::new("alacritty", "Alacritty");
        let b = Application::new("editor", "Editor");

        assert!(window_matches_app(&window, &a));
        let apps = vec![b, a.clone()];
        let found = find_matching_app(&window.clone().with_class("alacritty"), &apps).unwrap();
        assert_eq!(found.id, "alacritty");
    }

    #[test]
    fn matching_priority_order() {
        let app = Application::new("org.gnome.nautilus", "Files");

        // priority 1: initial title equals name
        assert!(window_matches_app(
            &Window::new("0x1").with_initial_title("Files"),
            &app
        ));
        // priority 3/4: class equals id
        assert!(window_matches_app(
            &Window::new("0x2").with_class("org.gnome.Nautilus"),
            &app
        ));
        // priority 5: name inside current title
        assert!(window_matches_app(
            &Window::new("0x3").with_title("Downloads — Files"),
            &app
        ));
        // priority 6: id inside class
        assert!(window_matches_app(
            &Window::new("0x4").with_class("wrapper-org.gnome.nautilus-bin"),
            &app
        ));
        // no relation at all
        assert!(!window_matches_app(
            &Window::new("0x5").with_class("vim").with_title("vimrc"),
            &app
        ));
    }

    #[test]
    fn class_lookup_prefers_exact_over_substring_and_shortest_id() {
        let apps = vec![
            Application::new("firefox-developer-edition", "Firefox Developer Edition"),
            Application::new("firefox.desktop", "Firefox"),
            Application::new("firefox-esr", "Firefox ESR"),
        ];
        let window = Window::new("0x1").with_class("firefox");

        // `.desktop` suffix is stripped for the exact comparison
        let found = find_matching_app(&window, &apps).unwrap();
        assert_eq!(found.id, "firefox.desktop");

        // with no exact candidate the shortest substring match wins
        let apps = vec![
            Application::new("firefox-developer-edition", "Firefox Developer Edition"),
            Application::new("firefox-esr", "Firefox ESR"),
        ];
        let found = find_matching_app(&window, &apps).unwrap();
        assert_eq!(found.id, "firefox-esr");
    }

    #[test]
    fn unmatched_windows_are_dropped() {
        let apps = vec![Application::new("firefox", "Firefox")];
        let windows = vec![Window::new("0x1").with_class("mystery").with_title("???")];

        let groups = group_windows(&windows, &apps, &NoIconLookup, &config());
        assert!(groups.is_empty());
    }

    #[test]
    fn group_key_is_deterministic() {
        let app = Application::new("firefox", "Firefox");
        let window = Window::new("0x1")
            .with_initial_title("Document.pdf — Firefox")
            .with_title("Document.pdf — Firefox")
            .with_class("firefox");

        let first = group_key(&window, &app, &config());
        let second = group_key(&window, &app, &config());
        assert_eq!(first, second);

        // same identifying fields, different address: same key
        let twin = Window::new("0x2")
            .with_initial_title("Document.pdf — Firefox")
            .with_title("Document.pdf — Firefox")
            .with_class("firefox");
        assert_eq!(group_key(&twin, &app, &config()), first);
    }

    #[test]
    fn branded_name_collapses_to_main_distinct_document_splits() {
        let app = Application::new("firefox", "Firefox");

        let main = Window::new("0x1")
            .with_initial_title("Mozilla Firefox")
            .with_class("firefox");
        assert_eq!(group_key(&main, &app, &config()), "firefox:main");

        let doc = Window::new("0x2")
            .with_initial_title("Document.pdf — Firefox")
            .with_class("firefox");
        assert_eq!(
            group_key(&doc, &app, &config()),
            "firefox:Document.pdf — Firefox"
        );
    }

    #[test]
    fn drifted_current_title_keys_its_own_group() {
        let app = Application::new("code", "Code");
        let window = Window::new("0x1")
            .with_initial_title("Code")
            .with_title("big-refactor — my-project — Code")
            .with_class("code");

        assert_eq!(
            group_key(&window, &app, &config()),
            "code:big-refactor — my-project — Code"
        );

        // short drift stays in the main group
        let short = Window::new("0x2")
            .with_initial_title("Code")
            .with_title("Codes")
            .with_class("code");
        assert_eq!(group_key(&short, &app, &config()), "code:main");
    }

    #[test]
    fn missing_titles_fall_back_to_bare_id() {
        let app = Application::new("kitty", "kitty");
        let window = Window::new("0x1").with_class("kitty");
        assert_eq!(group_key(&window, &app, &config()), "kitty");
    }

    #[test]
    fn two_firefox_instances_form_two_groups() {
        let apps = vec![Application::new("firefox", "Firefox").with_icon("firefox")];
        let windows = vec![
            Window::new("0x1")
                .with_app_id("firefox")
                .with_initial_title("Mozilla Firefox")
                .with_title("Mozilla Firefox")
                .with_class("firefox"),
            Window::new("0x2")
                .with_app_id("firefox")
                .with_initial_title("Document.pdf — Firefox")
                .with_title("Document.pdf — Firefox")
                .with_class("firefox"),
        ];

        let groups = group_windows(&windows, &apps, &NoIconLookup, &config());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["firefox:main"].windows.len(), 1);
        assert_eq!(groups["firefox:main"].windows[0].address, "0x1");
        assert_eq!(
            groups["firefox:Document.pdf — Firefox"].windows[0].address,
            "0x2"
        );
        // registry icon falls through when no desktop override exists
        assert_eq!(groups["firefox:main"].icon.as_deref(), Some("firefox"));
    }

    #[test]
    fn every_window_lands_in_exactly_one_group() {
        let apps = vec![
            Application::new("firefox", "Firefox"),
            Application::new("kitty", "kitty"),
        ];
        let windows = vec![
            Window::new("0x1").with_class("kitty").with_initial_title("kitty"),
            Window::new("0x2").with_class("kitty").with_initial_title("kitty"),
            Window::new("0x3")
                .with_class("firefox")
                .with_initial_title("Mozilla Firefox"),
        ];

        let groups = group_windows(&windows, &apps, &NoIconLookup, &config());
        let total: usize = groups.values().map(|g| g.windows.len()).sum();
        assert_eq!(total, windows.len());

        let mut seen: Vec<&str> = groups
            .values()
            .flat_map(|g| g.windows.iter().map(|w| w.address.as_str()))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec!["0x1", "0x2", "0x3"]);
    }
}
