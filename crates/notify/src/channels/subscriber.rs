//! In-process live subscriber channel.
//!
//! Every subscriber gets its own receiver and sees every event published
//! after it subscribed. Slow subscribers lose the oldest events instead of
//! back-pressuring the publisher.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::ChannelError;
use crate::NotifyChannel;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out channel backed by a tokio broadcast queue.
pub struct SubscriberChannel {
    sender: broadcast::Sender<Arc<str>>,
}

impl SubscriberChannel {
    /// Create a channel buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a new live subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.sender.subscribe()
    }

    fn broadcast(&self, message: &str) {
        // An error here only means nobody is listening right now.
        match self.sender.send(Arc::from(message)) {
            Ok(delivered) => debug!(channel = "subscribers", delivered, "Event fanned out"),
            Err(_) => debug!(channel = "subscribers", "No live subscribers, event dropped"),
        }
    }

    /// Number of currently connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SubscriberChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl NotifyChannel for SubscriberChannel {
    fn name(&self) -> &'static str {
        "subscribers"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, message: &str) -> Result<(), ChannelError> {
        self.broadcast(message);
        Ok(())
    }

    fn send_now(&self, message: &str) -> Option<Result<(), ChannelError>> {
        self.broadcast(message);
        Some(Ok(()))
    }
}
