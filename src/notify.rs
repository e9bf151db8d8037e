//! transient operator notifications ("toasts")
//!
//! Fire-and-forget: `notify` never blocks and never fails. Notices go to
//! whoever is currently subscribed (the `/api/notifications` stream) and to
//! the log; nothing is kept around afterwards.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { kind, title: title.into(), description: description.into() }
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Error => tracing::warn!(title = %notice.title, "[NOTICE] {}", notice.description),
            _ => tracing::info!(title = %notice.title, "[NOTICE] {}", notice.description),
        }
        // no subscribers is not an error
        let _ = self.tx.send(notice);
    }

    pub fn info(&self, title: &str, description: impl Into<String>) {
        self.notify(Notice::new(NoticeKind::Info, title, description));
    }

    pub fn success(&self, title: &str, description: impl Into<String>) {
        self.notify(Notice::new(NoticeKind::Success, title, description));
    }

    pub fn error(&self, title: &str, description: impl Into<String>) {
        self.notify(Notice::new(NoticeKind::Error, title, description));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_subscribers() {
        Notifier::new().success("Settings Saved", "nobody is listening");
    }

    #[test]
    fn test_subscriber_receives_notice() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        notifier.error("Login Failed", "Invalid email or password");
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.title, "Login Failed");
        assert!(rx.try_recv().is_err());
    }
}
