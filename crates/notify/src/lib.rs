//! Best-effort live event fan-out.
//!
//! This crate provides a fire-and-forget dispatcher that pushes events to
//! every live subscriber (dashboards, websocket bridges) and to optional
//! webhook receivers. Delivery is never retried and never reported back to
//! the publisher as an error.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use notify::{Notifier, SubscriberChannel};
//!
//! # async fn run() {
//! let live = Arc::new(SubscriberChannel::default());
//! let mut feed = live.subscribe();
//! let notifier = Notifier::with_channels(vec![live]);
//!
//! notifier.notify(&serde_json::json!({ "type": "alert_opened", "officeId": "OFFICE_1" }));
//! let message = feed.recv().await;
//! # }
//! ```
//!
//! # Configuration
//!
//! [`Notifier::from_env`] reads:
//!
//! - `NOTIFY_WEBHOOK_URL`: webhook URL (enables the webhook channel)
//! - `NOTIFY_DISABLED`: set to "true" to disable all fan-out

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;

pub use channels::subscriber::SubscriberChannel;
pub use channels::webhook::WebhookChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Environment variable to disable all notifications.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Central fan-out dispatcher.
///
/// The `Notifier` owns a set of channels and dispatches each event to all
/// enabled channels in a fire-and-forget manner.
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
    disabled: bool,
}

impl Notifier {
    /// Create a notifier from environment variables, with `extra` channels
    /// (typically the in-process subscriber channel) always attached.
    #[must_use]
    pub fn from_env(extra: Vec<Arc<dyn NotifyChannel>>) -> Self {
        let disabled = std::env::var(ENV_NOTIFY_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if disabled {
            info!("Live fan-out disabled via NOTIFY_DISABLED");
            return Self::disabled();
        }

        let mut channels = extra;

        let webhook = WebhookChannel::from_env();
        if webhook.enabled() {
            info!("Webhook fan-out enabled");
            channels.push(Arc::new(webhook));
        }

        if channels.is_empty() {
            warn!("No fan-out channels configured");
        } else {
            info!(channel_count = channels.len(), "Fan-out initialized");
        }

        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a notifier with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a disabled notifier (for testing or when fan-out is off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
        }
    }

    /// Check if any channels are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Get the number of enabled channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        if self.disabled {
            0
        } else {
            self.channels.len()
        }
    }

    /// Send an event to all enabled channels (fire-and-forget).
    ///
    /// The event is serialized once. Channels that can deliver without
    /// awaiting (in-process subscribers) receive it before this returns, so
    /// they observe events in the order the caller published them. Every
    /// other channel gets its own spawned task on the current tokio runtime
    /// and may observe events out of order. Errors are logged, never
    /// returned.
    pub fn notify<E: Serialize + ?Sized>(&self, event: &E) {
        if !self.has_channels() {
            debug!("No active channels, skipping event");
            return;
        }

        let message: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!(error = %ChannelError::Encode(e.to_string()), "Failed to serialize event");
                return;
            }
        };

        let runtime = tokio::runtime::Handle::try_current().ok();

        for channel in &self.channels {
            let channel_name = channel.name();
            if !channel.enabled() {
                debug!(channel = channel_name, "Channel disabled, skipping");
                continue;
            }

            if let Some(result) = channel.send_now(&message) {
                if let Err(e) = result {
                    log_failure(channel_name, &e);
                }
                continue;
            }

            let Some(runtime) = runtime.as_ref() else {
                warn!(channel = channel_name, "No async runtime available, event dropped");
                continue;
            };

            let channel = Arc::clone(channel);
            let message = Arc::clone(&message);
            runtime.spawn(async move {
                if let Err(e) = channel.send(&message).await {
                    log_failure(channel.name(), &e);
                }
            });
        }
    }

    /// Send an event and wait for all channels to complete.
    ///
    /// Unlike `notify()`, this waits for every channel and collects the
    /// results. Useful for testing or when delivery confirmation is needed.
    pub async fn notify_and_wait<E: Serialize + ?Sized>(
        &self,
        event: &E,
    ) -> Vec<(String, Result<(), ChannelError>)> {
        if !self.has_channels() {
            return vec![];
        }

        let message = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                return self
                    .channels
                    .iter()
                    .map(|c| {
                        (
                            c.name().to_string(),
                            Err(ChannelError::Encode(e.to_string())),
                        )
                    })
                    .collect();
            }
        };

        let sends = self.channels.iter().map(|channel| {
            let message = message.as_str();
            async move { (channel.name().to_string(), channel.send(message).await) }
        });

        futures::future::join_all(sends).await
    }
}

fn log_failure(channel: &str, err: &ChannelError) {
    error!(
        channel,
        error = %err,
        transient = err.is_transient(),
        "Failed to deliver event"
    );
}
