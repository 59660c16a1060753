use shared::error::ProtocolViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// No response was received: connect failure, DNS failure, timeout, or a
    /// connection dropped before the response head arrived.
    #[error("network unavailable for {url}: {reason}")]
    NetworkUnavailable { url: String, reason: String },
    #[error("server responded with HTTP {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Http { status: u16, message: Option<String> },
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolViolation),
}

impl TransportError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NetworkUnavailable { .. } => FailureKind::NetworkUnavailable,
            Self::Http { .. } => FailureKind::Http,
            Self::Protocol(_) => FailureKind::Protocol,
        }
    }

    pub fn is_transport_level(&self) -> bool {
        matches!(self, Self::NetworkUnavailable { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NetworkUnavailable,
    Http,
    Protocol,
}
