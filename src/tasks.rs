//! Registry of delayed simulations. Every scheduled delay owns a
//! cancellation token; scheduling again under the same key cancels the
//! delay already in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use teloxide::types::ChatId;
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKey {
    PaymentLink(String),
    InvoiceLink(String),
    PatientLookup(ChatId),
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKey::PaymentLink(id) => write!(f, "payment link for {}", id),
            TaskKey::InvoiceLink(number) => write!(f, "payment link for {}", number),
            TaskKey::PatientLookup(chat_id) => write!(f, "patient lookup for chat {}", chat_id),
        }
    }
}

/// Resolves when the owning registry entry is cancelled or replaced.
pub struct CancelToken {
    key: TaskKey,
    generation: u64,
    rx: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Entries {
    next_generation: u64,
    live: HashMap<TaskKey, (u64, oneshot::Sender<()>)>,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    entries: Arc<Mutex<Entries>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new task under `key`, cancelling any previous one.
    pub async fn register(&self, key: TaskKey) -> CancelToken {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock().await;
        entries.next_generation += 1;
        let generation = entries.next_generation;

        if let Some((_, previous)) = entries.live.insert(key.clone(), (generation, tx)) {
            let _ = previous.send(());
            log::info!("⏹️ Superseded pending {}", key);
        }

        CancelToken { key, generation, rx }
    }

    /// Cancels the task registered under `key`. Returns whether one was pending.
    pub async fn cancel(&self, key: &TaskKey) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.live.remove(key) {
            Some((_, tx)) => {
                let _ = tx.send(());
                log::info!("⏹️ Cancelled pending {}", key);
                true
            }
            None => false,
        }
    }

    pub async fn is_pending(&self, key: &TaskKey) -> bool {
        self.entries.lock().await.live.contains_key(key)
    }

    /// Sleeps for `delay` unless the token is cancelled first. Returns `true`
    /// when the full delay elapsed. The registry entry is released either way.
    pub async fn delay(&self, delay: Duration, token: CancelToken) -> bool {
        let CancelToken { key, generation, mut rx } = token;

        let elapsed = tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = &mut rx => false,
        };

        if elapsed {
            let mut entries = self.entries.lock().await;
            // A newer registration under the same key must stay in place.
            if entries.live.get(&key).is_some_and(|(g, _)| *g == generation) {
                entries.live.remove(&key);
            }
        }

        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn delay_elapses_without_cancellation() {
        let registry = TaskRegistry::new();
        let key = TaskKey::PaymentLink("BK10002".to_string());
        let token = registry.register(key.clone()).await;
        assert!(registry.is_pending(&key).await);
        assert!(registry.delay(Duration::from_millis(1500), token).await);
        assert!(!registry.is_pending(&key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_delay() {
        let registry = TaskRegistry::new();
        let key = TaskKey::PaymentLink("BK10002".to_string());
        let token = registry.register(key.clone()).await;

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.delay(Duration::from_secs(2), token).await })
        };
        tokio::task::yield_now().await;

        assert!(registry.cancel(&key).await);
        assert!(!waiter.await.unwrap());
        assert!(!registry.cancel(&key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_registration_supersedes_older() {
        let registry = TaskRegistry::new();
        let key = TaskKey::PatientLookup(ChatId(7));
        let first = registry.register(key.clone()).await;
        let second = registry.register(key.clone()).await;

        assert!(!registry.delay(Duration::from_secs(1), first).await);
        assert!(registry.is_pending(&key).await);
        assert!(registry.delay(Duration::from_secs(1), second).await);
        assert!(!registry.is_pending(&key).await);
    }
}
