use chrono::{DateTime, Utc};
use thiserror::Error;

use parley_api::ApiError;

const FALLBACK: &str = "Failed to send message";

/// Why a send did not go through. Everything except `Rejected` is caught
/// locally, before any network call.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("message is empty")]
    EmptyBody,

    #[error("account is muted until {until}")]
    Muted { until: DateTime<Utc> },

    #[error("account is banned")]
    Banned,

    #[error("replies are only supported in the public room")]
    ReplyNotSupported,

    #[error("server rejected the message: {0}")]
    Rejected(#[from] ApiError),
}

impl SendError {
    /// Text to show the user.
    pub fn user_message(&self) -> String {
        match self {
            SendError::EmptyBody => "Message cannot be empty".into(),
            SendError::Muted { until } => format!(
                "You are muted until {}",
                until.format("%Y-%m-%d %H:%M UTC")
            ),
            SendError::Banned => "Your account has been banned".into(),
            SendError::ReplyNotSupported => "Replies are only available in the public room".into(),
            SendError::Rejected(err) => err.reason().unwrap_or(FALLBACK).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_prefers_server_reason() {
        let err = SendError::Rejected(ApiError::Status {
            status: 400,
            reason: Some("Pesan terlalu panjang".into()),
        });
        assert_eq!(err.user_message(), "Pesan terlalu panjang");

        let err = SendError::Rejected(ApiError::SessionExpired);
        assert_eq!(err.user_message(), FALLBACK);
    }
}
