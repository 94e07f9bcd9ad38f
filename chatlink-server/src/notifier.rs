use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chatlink_common::{AcceptedEvent, AccountId};
use tokio::sync::broadcast;
use tracing::debug;

/// Best-effort, at-most-once push to the sender of an accepted request.
pub trait Notifier: Send + Sync {
    /// Must not block and must not fail; problems are logged and swallowed.
    fn notify(&self, target: &AccountId, event: AcceptedEvent);
}

/// Live per-account channels, joined by whoever is listening for an
/// account's events (the SSE route).
pub struct ChannelRegistry {
    channels: Mutex<HashMap<AccountId, broadcast::Sender<AcceptedEvent>>>,
    capacity: usize,
}

impl ChannelRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Also drops channels of every account whose listeners have all gone.
    pub fn join(&self, account: &AccountId) -> broadcast::Receiver<AcceptedEvent> {
        let capacity = self.capacity;
        let mut channels = self.channels();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        let rx = channels
            .entry(account.clone())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();
        rx
    }

    #[cfg(test)]
    fn is_online(&self, account: &AccountId) -> bool {
        self.channels()
            .get(account)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<AccountId, broadcast::Sender<AcceptedEvent>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Notifier for ChannelRegistry {
    fn notify(&self, target: &AccountId, event: AcceptedEvent) {
        let mut channels = self.channels();
        let Some(sender) = channels.get(target) else {
            debug!(account = %target, "account not connected, dropping event");
            return;
        };
        match sender.send(event) {
            Ok(receivers) => debug!(account = %target, receivers, "pushed accepted event"),
            Err(_) => {
                // every receiver is gone
                channels.remove(target);
                debug!(account = %target, "channel closed, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_common::Email;

    fn event() -> AcceptedEvent {
        AcceptedEvent::new(Email::normalize("b@x.com").unwrap())
    }

    #[tokio::test]
    async fn delivers_to_joined_account() {
        let registry = ChannelRegistry::new(4);
        let a = AccountId("a".into());
        let mut rx = registry.join(&a);
        assert!(registry.is_online(&a));

        registry.notify(&a, event());
        assert_eq!(rx.recv().await.unwrap(), event());
    }

    #[tokio::test]
    async fn every_listener_gets_a_copy() {
        let registry = ChannelRegistry::new(4);
        let a = AccountId("a".into());
        let mut first = registry.join(&a);
        let mut second = registry.join(&a);

        registry.notify(&a, event());
        assert_eq!(first.recv().await.unwrap(), event());
        assert_eq!(second.recv().await.unwrap(), event());
    }

    #[test]
    fn drops_events_for_offline_accounts() {
        let registry = ChannelRegistry::new(4);
        let a = AccountId("a".into());
        registry.notify(&a, event());
        assert!(!registry.is_online(&a));
    }

    #[test]
    fn prunes_channels_without_receivers() {
        let registry = ChannelRegistry::new(4);
        let a = AccountId("a".into());
        drop(registry.join(&a));
        assert!(!registry.is_online(&a));

        registry.notify(&a, event());
        assert!(registry.channels().get(&a).is_none());
    }

    #[test]
    fn joining_prunes_abandoned_channels() {
        let registry = ChannelRegistry::new(4);
        let a = AccountId("a".into());
        let b = AccountId("b".into());
        drop(registry.join(&a));
        let _rx_b = registry.join(&b);

        let channels = registry.channels();
        assert!(channels.get(&a).is_none());
        assert!(channels.get(&b).is_some());
    }

    #[test]
    fn rejoining_keeps_live_listeners() {
        let registry = ChannelRegistry::new(4);
        let a = AccountId("a".into());
        let mut first = registry.join(&a);
        let _second = registry.join(&a);

        registry.notify(&a, event());
        assert_eq!(first.try_recv().unwrap(), event());
    }

    #[test]
    fn only_the_target_is_notified() {
        let registry = ChannelRegistry::new(4);
        let a = AccountId("a".into());
        let b = AccountId("b".into());
        let mut rx_b = registry.join(&b);
        registry.notify(&a, event());
        assert!(rx_b.try_recv().is_err());
    }
}
