//! Change notifier adapters.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::models::GraphUpdate;
use crate::domain::ports::ChangeNotifier;

/// Broadcasts graph updates to any number of subscribers.
///
/// Publishing never blocks. Slow subscribers lag and lose the oldest updates; with no
/// subscribers the update is dropped.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<GraphUpdate>,
    published: AtomicU64,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphUpdate> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Updates published so far, delivered or not.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn publish(&self, update: GraphUpdate) {
        self.published.fetch_add(1, Ordering::Relaxed);
        // No subscribers is not an error.
        let _ = self.sender.send(update);
    }
}

/// Writes updates to the debug log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ChangeNotifier for LogNotifier {
    fn publish(&self, update: GraphUpdate) {
        debug!(
            node_id = %update.id,
            parent_id = ?update.parent_id,
            score = ?update.score,
            "Graph update"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn update() -> GraphUpdate {
        GraphUpdate {
            id: Uuid::new_v4(),
            projection: None,
            score: Some(0.5),
            parent_id: Some(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_update() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        let sent = update();
        notifier.publish(sent.clone());
        assert_eq!(rx.recv().await.unwrap(), sent);
        assert_eq!(notifier.published(), 1);
    }

    #[test]
    fn test_publish_without_subscribers_does_not_fail() {
        let notifier = BroadcastNotifier::default();
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.publish(update());
        notifier.publish(update());
        assert_eq!(notifier.published(), 2);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let notifier = BroadcastNotifier::new(2);
        let mut rx = notifier.subscribe();
        for _ in 0..5 {
            notifier.publish(update());
        }
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(3))));
    }
}
