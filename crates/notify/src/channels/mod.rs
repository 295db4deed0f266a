//! Notification channel implementations.

pub mod subscriber;
pub mod webhook;

use async_trait::async_trait;

use crate::error::ChannelError;

/// Trait for delivery channels (in-process subscribers, webhooks, ...).
///
/// Channels receive the event already serialized to JSON so that one event
/// is encoded once no matter how many channels are enabled.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Check if this channel is enabled/configured.
    fn enabled(&self) -> bool;

    /// Deliver one serialized event to this channel.
    async fn send(&self, message: &str) -> Result<(), ChannelError>;

    /// Deliver without awaiting, if the channel can. Channels that answer
    /// `Some` are served on the publisher's thread in publish order;
    /// the rest get a spawned task per event.
    fn send_now(&self, _message: &str) -> Option<Result<(), ChannelError>> {
        None
    }
}
