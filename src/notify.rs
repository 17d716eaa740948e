use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Warning,
    Error,
}

/// transient message for the user
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// sink for user-visible notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn error(&self, message: &str) {
        self.notify(Notification::new(Level::Error, message));
    }

    fn warning(&self, message: &str) {
        self.notify(Notification::new(Level::Warning, message));
    }

    fn success(&self, message: &str) {
        self.notify(Notification::new(Level::Success, message));
    }
}

/// writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Error => tracing::error!("❌ {}", n.message),
            Level::Warning => tracing::warn!("⚠️  {}", n.message),
            Level::Success => tracing::info!("✅ {}", n.message),
        }
    }
}

/// broadcast asking every knowledge base list view to reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    pub force_refresh: bool,
}

/// process-wide list-refresh channel
#[derive(Clone)]
pub struct RefreshBus {
    tx: broadcast::Sender<RefreshRequest>,
}

impl RefreshBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshRequest> {
        self.tx.subscribe()
    }

    /// fire and forget, having no listeners is fine
    pub fn notify(&self, force_refresh: bool) {
        let listeners = self.tx.send(RefreshRequest { force_refresh }).unwrap_or(0);
        tracing::debug!("Knowledge base list refresh sent to {} listeners", listeners);
    }
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}
