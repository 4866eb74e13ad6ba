//! Notification delivery capability.
//!
//! The collector's observers format human-facing messages; where those
//! messages go (chat, webhook, log) is behind the [`Notifier`] trait so the
//! engine never depends on a delivery mechanism.

use tracing::info;

/// Injected notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Default sink: structured log at info level.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!("[notify] {message}");
    }
}
