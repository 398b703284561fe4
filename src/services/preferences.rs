use serde::{Deserialize, Serialize};

use super::storage::{read_json, write_json, KeyValueStore};
use crate::config;

/// Theme actually applied to the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Which sidebar sections are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidebarSections {
    pub pinned: bool,
    pub recent: bool,
    pub folders: bool,
    pub templates: bool,
}

impl Default for SidebarSections {
    fn default() -> Self {
        Self {
            pinned: true,
            recent: false,
            folders: true,
            templates: true,
        }
    }
}

pub struct PreferencesService;

impl PreferencesService {
    /// The stored theme, or the platform preference when none is stored.
    pub fn load_theme(store: &dyn KeyValueStore, prefers_dark: bool) -> Theme {
        read_json(store, config::THEME_KEY).unwrap_or(if prefers_dark {
            Theme::Dark
        } else {
            Theme::Light
        })
    }

    pub fn save_theme(store: &dyn KeyValueStore, theme: Theme) {
        write_json(store, config::THEME_KEY, &theme);
    }

    pub fn load_sidebar_sections(store: &dyn KeyValueStore) -> SidebarSections {
        read_json(store, config::SIDEBAR_SECTIONS_KEY).unwrap_or_default()
    }

    pub fn save_sidebar_sections(store: &dyn KeyValueStore, sections: &SidebarSections) {
        write_json(store, config::SIDEBAR_SECTIONS_KEY, sections);
    }

    pub fn load_sidebar_collapsed(store: &dyn KeyValueStore) -> bool {
        read_json(store, config::SIDEBAR_COLLAPSED_KEY).unwrap_or(false)
    }

    pub fn save_sidebar_collapsed(store: &dyn KeyValueStore, collapsed: bool) {
        write_json(store, config::SIDEBAR_COLLAPSED_KEY, &collapsed);
    }
}

/// Guess the terminal's background from `COLORFGBG` ("fg;bg"); low ANSI
/// background indices other than 7 are dark.
pub fn platform_prefers_dark() -> bool {
    std::env::var("COLORFGBG")
        .ok()
        .and_then(|value| value.rsplit(';').next()?.parse::<u8>().ok())
        .map(|bg| bg < 7 || bg == 8)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Database;

    #[test]
    fn test_theme_falls_back_to_platform() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(PreferencesService::load_theme(&db, true), Theme::Dark);
        assert_eq!(PreferencesService::load_theme(&db, false), Theme::Light);

        PreferencesService::save_theme(&db, Theme::Light);
        assert_eq!(PreferencesService::load_theme(&db, true), Theme::Light);
        assert_eq!(db.get(config::THEME_KEY).unwrap().as_deref(), Some("\"light\""));
    }

    #[test]
    fn test_sidebar_defaults_and_partial_maps() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(
            PreferencesService::load_sidebar_sections(&db),
            SidebarSections::default()
        );
        assert!(!PreferencesService::load_sidebar_collapsed(&db));

        db.set(config::SIDEBAR_SECTIONS_KEY, r#"{"recent":true}"#).unwrap();
        let sections = PreferencesService::load_sidebar_sections(&db);
        assert!(sections.recent);
        assert!(sections.pinned);

        PreferencesService::save_sidebar_collapsed(&db, true);
        assert!(PreferencesService::load_sidebar_collapsed(&db));
    }
}
