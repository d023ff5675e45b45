//! Classified model-service errors.

use std::fmt;

use serde::Serialize;

/// Substrings that mark an otherwise unclassified upstream failure as transient.
pub const TRANSIENT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "rate_limit",
    "500",
    "502",
    "503",
    "504",
    "timeout",
    "timed out",
    "connection",
];

/// Why a model-service call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// 401/403: bad API key or permissions.
    Auth,
    /// 402: quota exhausted.
    Billing,
    /// 429.
    RateLimit,
    /// 404 or unknown model.
    NotFound,
    /// 408 or client-side request timeout.
    Timeout,
    /// Connection refused, DNS failure, reset.
    Network,
    /// 500/502/503/504.
    ServerError,
    /// The service answered, but not with a usable completion.
    InvalidResponse,
    Unknown,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::Billing => "billing",
            ProviderErrorKind::RateLimit => "rate_limit",
            ProviderErrorKind::NotFound => "not_found",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::ServerError => "server_error",
            ProviderErrorKind::InvalidResponse => "invalid_response",
            ProviderErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A failed call to the model service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Auth,
            402 => ProviderErrorKind::Billing,
            404 => ProviderErrorKind::NotFound,
            408 => ProviderErrorKind::Timeout,
            429 => ProviderErrorKind::RateLimit,
            500 | 502 | 503 | 504 => ProviderErrorKind::ServerError,
            _ => ProviderErrorKind::Unknown,
        };
        Self {
            kind,
            status: Some(status),
            message: truncate_body(body),
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Network
        };
        Self::new(kind, err.to_string())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidResponse, message)
    }

    /// Whether the same request is worth sending again.
    ///
    /// Known kinds decide on their own; unclassified errors fall back to
    /// [`TRANSIENT_MARKERS`] in the message.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            ProviderErrorKind::RateLimit
            | ProviderErrorKind::Timeout
            | ProviderErrorKind::Network
            | ProviderErrorKind::ServerError => true,
            ProviderErrorKind::Unknown => {
                let lower = self.message.to_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "provider error ({status}, {}): {}", self.kind, self.message),
            None => write!(f, "provider error ({}): {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderError::from_status(401, "").kind, ProviderErrorKind::Auth);
        assert_eq!(ProviderError::from_status(403, "").kind, ProviderErrorKind::Auth);
        assert_eq!(ProviderError::from_status(402, "").kind, ProviderErrorKind::Billing);
        assert_eq!(ProviderError::from_status(404, "").kind, ProviderErrorKind::NotFound);
        assert_eq!(ProviderError::from_status(408, "").kind, ProviderErrorKind::Timeout);
        assert_eq!(ProviderError::from_status(429, "").kind, ProviderErrorKind::RateLimit);
        for code in [500, 502, 503, 504] {
            assert_eq!(
                ProviderError::from_status(code, "").kind,
                ProviderErrorKind::ServerError
            );
        }
        assert_eq!(ProviderError::from_status(418, "").kind, ProviderErrorKind::Unknown);
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ProviderError::from_status(429, "slow down").is_transient());
        assert!(ProviderError::from_status(503, "").is_transient());
        assert!(ProviderError::new(ProviderErrorKind::Network, "reset").is_transient());
        assert!(!ProviderError::from_status(401, "bad key").is_transient());
        assert!(!ProviderError::invalid_response("no choices").is_transient());
    }

    #[test]
    fn test_unknown_falls_back_to_markers() {
        assert!(ProviderError::new(ProviderErrorKind::Unknown, "Connection reset by peer")
            .is_transient());
        assert!(ProviderError::new(ProviderErrorKind::Unknown, "request Timed Out").is_transient());
        assert!(ProviderError::new(ProviderErrorKind::Unknown, "upstream said 502").is_transient());
        assert!(!ProviderError::new(ProviderErrorKind::Unknown, "invalid model").is_transient());
    }

    #[test]
    fn test_auth_never_transient_even_with_marker_text() {
        let err = ProviderError::from_status(401, "connection not authorized");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_body_truncated() {
        let body = "é".repeat(400);
        let err = ProviderError::from_status(500, &body);
        assert!(err.message.ends_with("..."));
        assert!(err.message.len() <= 303);
    }

    #[test]
    fn test_display_includes_status() {
        let err = ProviderError::from_status(429, "too many");
        assert_eq!(err.to_string(), "provider error (429, rate_limit): too many");
    }
}
