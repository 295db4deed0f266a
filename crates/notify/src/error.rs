//! Delivery failures reported by fan-out channels.

use thiserror::Error;

/// Why one event did not reach one channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The event could not be encoded as JSON; no channel saw it.
    #[error("Event could not be encoded: {0}")]
    Encode(String),

    /// The channel lacks the setting it needs to deliver.
    #[error("Channel missing setting {setting}")]
    Unconfigured { setting: &'static str },

    /// Transport failure talking to a webhook receiver.
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook receiver answered with a non-success status.
    #[error("Webhook rejected event with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Webhook rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl ChannelError {
    /// Whether a later event may get through without operator action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::RateLimited { .. })
            || matches!(self, Self::Rejected { status, .. } if *status >= 500)
    }
}
