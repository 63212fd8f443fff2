use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Status { status: u16, reason: Option<String> },

    #[error("session expired")]
    SessionExpired,

    #[error("invalid endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Server-provided reason, if the server sent one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ApiError::Status { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_formats_reason() {
        let err = ApiError::Status {
            status: 403,
            reason: Some("Kamu sedang di-mute".into()),
        };
        assert_eq!(err.to_string(), "server returned 403: Kamu sedang di-mute");
        assert_eq!(err.reason(), Some("Kamu sedang di-mute"));

        let bare = ApiError::Status { status: 500, reason: None };
        assert_eq!(bare.to_string(), "server returned 500");
        assert_eq!(bare.reason(), None);
    }
}
