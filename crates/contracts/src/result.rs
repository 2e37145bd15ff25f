//! SendResult - terminal outcome of a dispatched message

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome delivered to the producer once a message leaves the dispatcher.
///
/// Send *failures* are not a variant: they surface as an error on the
/// completion so the underlying cause stays attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult<T> {
    /// Forwarded to the output channel, which answered with `T`
    Sent(T),
    /// Expired before it was selected, or nothing could be sent
    NotSent,
    /// Rejected or abandoned because the dispatcher left the active state
    NotSentShuttingDown,
}

/// Field-less mirror of [`SendResult`], handy for counting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    NotSent,
    NotSentShuttingDown,
}

impl<T> SendResult<T> {
    pub fn status(&self) -> SendStatus {
        match self {
            Self::Sent(_) => SendStatus::Sent,
            Self::NotSent => SendStatus::NotSent,
            Self::NotSentShuttingDown => SendStatus::NotSentShuttingDown,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }

    /// The channel's answer, if the message was sent.
    pub fn into_sent(self) -> Option<T> {
        match self {
            Self::Sent(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sent => "sent",
            Self::NotSent => "not_sent",
            Self::NotSentShuttingDown => "not_sent_shutting_down",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mirrors_variant() {
        assert_eq!(SendResult::Sent(1).status(), SendStatus::Sent);
        assert_eq!(SendResult::<u8>::NotSent.status(), SendStatus::NotSent);
        assert_eq!(
            SendResult::<u8>::NotSentShuttingDown.status(),
            SendStatus::NotSentShuttingDown
        );
    }

    #[test]
    fn test_into_sent() {
        assert_eq!(SendResult::Sent("ack").into_sent(), Some("ack"));
        assert_eq!(SendResult::<&str>::NotSent.into_sent(), None);
        assert!(!SendResult::<()>::NotSentShuttingDown.is_sent());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SendStatus::NotSentShuttingDown.to_string(), "not_sent_shutting_down");
    }
}
