//! ui theme preference, persisted under `theme`

use crate::domain::Theme;
use crate::notify::Notifier;
use crate::storage::{SharedStore, StorageError, THEME_KEY};

pub struct ThemeStore {
    store: SharedStore,
    current: Theme,
    notifier: Notifier,
}

/// parse a theme name, substituting dark for anything unrecognized
pub fn parse_or_default(raw: &str) -> Theme {
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!("[THEME] {}, falling back to {}", e, Theme::default());
        Theme::default()
    })
}

impl ThemeStore {
    pub fn load(store: SharedStore, notifier: Notifier) -> Self {
        let current = store
            .get(THEME_KEY)
            .map(|raw| parse_or_default(&raw))
            .unwrap_or_default();
        Self { store, current, notifier }
    }

    pub fn get(&self) -> Theme {
        self.current
    }

    /// apply a theme by name; returns the theme actually applied
    pub fn set(&mut self, raw: &str) -> Result<Theme, StorageError> {
        let theme = parse_or_default(raw);
        self.store.set(THEME_KEY, theme.as_str())?;
        self.current = theme;
        self.notifier.info(
            "Theme Updated",
            format!("Application theme changed to {} mode.", theme),
        );
        Ok(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    #[test]
    fn test_load_defaults_to_dark() {
        let store = Arc::new(MemoryStore::new());
        assert_eq!(ThemeStore::load(store.clone(), Notifier::new()).get(), Theme::Dark);

        store.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(ThemeStore::load(store.clone(), Notifier::new()).get(), Theme::Dark);

        store.set(THEME_KEY, "light").unwrap();
        assert_eq!(ThemeStore::load(store, Notifier::new()).get(), Theme::Light);
    }

    #[test]
    fn test_set_persists_and_recovers_unknown() {
        let store = Arc::new(MemoryStore::new());
        let mut themes = ThemeStore::load(store.clone(), Notifier::new());

        assert_eq!(themes.set("light").unwrap(), Theme::Light);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("light"));

        assert_eq!(themes.set("blue").unwrap(), Theme::Dark);
        assert_eq!(themes.get(), Theme::Dark);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
    }
}
