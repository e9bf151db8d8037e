//! alert threshold store
//!
//! Holds the operator's pressure/temperature/flow thresholds. Reads are a
//! plain copy of the last successful update. Every update replaces the whole
//! set, is written to the store before it becomes visible, and is published
//! on a watch channel so live telemetry views reclassify immediately.

use tokio::sync::watch;

use crate::domain::{Metric, ThresholdSettings};
use crate::notify::Notifier;
use crate::storage::{SharedStore, StorageError, THRESHOLDS_KEY};

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("{metric} threshold {value} is outside the allowed range")]
    OutOfRange { metric: Metric, value: f64 },
    #[error("could not persist thresholds: {0}")]
    Storage(#[from] StorageError),
}

pub struct ThresholdStore {
    store: SharedStore,
    current: ThresholdSettings,
    tx: watch::Sender<ThresholdSettings>,
    notifier: Notifier,
}

impl ThresholdStore {
    /// load the persisted thresholds, falling back to defaults on anything odd
    pub fn load(store: SharedStore, notifier: Notifier) -> Self {
        let current = Self::read_persisted(&store);
        let (tx, _) = watch::channel(current);
        Self { store, current, tx, notifier }
    }

    fn read_persisted(store: &SharedStore) -> ThresholdSettings {
        let Some(raw) = store.get(THRESHOLDS_KEY) else {
            return ThresholdSettings::default();
        };
        match serde_json::from_str::<ThresholdSettings>(&raw) {
            Ok(settings) => match settings.out_of_range() {
                None => settings,
                Some((metric, value)) => {
                    tracing::warn!(%metric, value, "[THRESHOLDS] persisted value out of range, using defaults");
                    ThresholdSettings::default()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "[THRESHOLDS] persisted value unreadable, using defaults");
                ThresholdSettings::default()
            }
        }
    }

    pub fn get(&self) -> ThresholdSettings {
        self.current
    }

    /// replace all three thresholds at once
    pub fn update(&mut self, new: ThresholdSettings) -> Result<ThresholdSettings, ThresholdError> {
        self.apply(new)?;
        self.notifier.success(
            "Settings Saved",
            format!(
                "Thresholds set to {} PSI, {} °C, {} L/min.",
                new.pressure, new.temperature, new.flow_rate
            ),
        );
        Ok(new)
    }

    /// back to 200 PSI / 80 °C / 300 L/min, through the same write path
    pub fn reset(&mut self) -> Result<ThresholdSettings, ThresholdError> {
        let defaults = self.apply(ThresholdSettings::default())?;
        self.notifier.info("Settings Reset", "Threshold values have been reset to defaults.");
        Ok(defaults)
    }

    /// validate, persist, then publish
    fn apply(&mut self, new: ThresholdSettings) -> Result<ThresholdSettings, ThresholdError> {
        if let Some((metric, value)) = new.out_of_range() {
            return Err(ThresholdError::OutOfRange { metric, value });
        }
        let json = serde_json::to_string(&new).map_err(StorageError::from)?;
        self.store.set(THRESHOLDS_KEY, &json)?;

        self.current = new;
        self.tx.send_replace(new);
        Ok(new)
    }

    pub fn subscribe(&self) -> watch::Receiver<ThresholdSettings> {
        self.tx.subscribe()
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoticeKind;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn store_with(raw: Option<&str>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        if let Some(raw) = raw {
            store.set(THRESHOLDS_KEY, raw).unwrap();
        }
        store
    }

    #[test]
    fn test_defaults_when_absent() {
        let thresholds = ThresholdStore::load(store_with(None), Notifier::new());
        assert_eq!(thresholds.get(), ThresholdSettings::new(200.0, 80.0, 300.0));
    }

    #[test]
    fn test_defaults_when_corrupt() {
        for raw in ["not json at all", "{\"pressure\":", "[]", r#"{"pressure":250}"#] {
            let thresholds = ThresholdStore::load(store_with(Some(raw)), Notifier::new());
            assert_eq!(thresholds.get(), ThresholdSettings::default(), "input {:?}", raw);
        }
    }

    #[test]
    fn test_defaults_when_out_of_range() {
        let raw = r#"{"pressure":5000,"temperature":80,"flowRate":300}"#;
        let thresholds = ThresholdStore::load(store_with(Some(raw)), Notifier::new());
        assert_eq!(thresholds.get(), ThresholdSettings::default());
    }

    #[test]
    fn test_update_reads_back_and_persists() {
        let store = store_with(None);
        let notifier = Notifier::new();
        let mut notices = notifier.subscribe();
        let mut thresholds = ThresholdStore::load(store.clone(), notifier);

        let wanted = ThresholdSettings::new(250.0, 90.0, 320.0);
        thresholds.update(wanted).unwrap();
        assert_eq!(thresholds.get(), wanted);

        let persisted: ThresholdSettings =
            serde_json::from_str(&store.get(THRESHOLDS_KEY).unwrap()).unwrap();
        assert_eq!(persisted, wanted);

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.title, "Settings Saved");

        // a fresh store instance sees the same triple
        let reloaded = ThresholdStore::load(store, Notifier::new());
        assert_eq!(reloaded.get(), wanted);
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let store = store_with(None);
        let mut thresholds = ThresholdStore::load(store.clone(), Notifier::new());
        let err = thresholds
            .update(ThresholdSettings::new(250.0, 90.0, 999.0))
            .unwrap_err();
        assert!(matches!(err, ThresholdError::OutOfRange { metric: Metric::FlowRate, .. }));
        assert_eq!(thresholds.get(), ThresholdSettings::default());
        assert_eq!(store.get(THRESHOLDS_KEY), None);
    }

    #[test]
    fn test_watchers_see_updates_and_reset() {
        let mut thresholds = ThresholdStore::load(store_with(None), Notifier::new());
        let mut rx = thresholds.subscribe();
        thresholds.update(ThresholdSettings::new(150.0, 60.0, 200.0)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ThresholdSettings::new(150.0, 60.0, 200.0));

        thresholds.reset().unwrap();
        assert_eq!(*rx.borrow_and_update(), ThresholdSettings::default());
    }

    #[test]
    fn test_reset_announces_reset_not_save() {
        let store = store_with(None);
        let notifier = Notifier::new();
        let mut thresholds = ThresholdStore::load(store.clone(), notifier.clone());
        thresholds.update(ThresholdSettings::new(250.0, 90.0, 320.0)).unwrap();

        let mut notices = notifier.subscribe();
        assert_eq!(thresholds.reset().unwrap(), ThresholdSettings::default());
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::Info);
        assert_eq!(notice.title, "Settings Reset");
        assert!(notices.try_recv().is_err());

        let persisted: ThresholdSettings =
            serde_json::from_str(&store.get(THRESHOLDS_KEY).unwrap()).unwrap();
        assert_eq!(persisted, ThresholdSettings::default());
    }
}
