use std::sync::OnceLock;

use tokio::sync::Notify;

/// Write-once slot for the first preferred link any worker observes.
///
/// Later offers are dropped rather than queued.
#[derive(Debug, Default)]
pub struct FastPath {
    link: OnceLock<String>,
    notify: Notify,
}

impl FastPath {
    /// Returns `true` if this offer won the slot.
    pub fn offer(&self, link: &str) -> bool {
        if self.link.set(link.to_string()).is_err() {
            return false;
        }
        // notify_one leaves a permit behind when nobody is waiting yet.
        self.notify.notify_one();
        true
    }

    pub fn get(&self) -> Option<&str> {
        self.link.get().map(String::as_str)
    }

    /// Resolves once a link has been offered.
    pub async fn wait(&self) -> String {
        loop {
            if let Some(link) = self.get() {
                return link.to_string();
            }
            self.notify.notified().await;
        }
    }
}
