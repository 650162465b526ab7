//! Terminal states of a single forward attempt

use std::fmt;

/// How a `write` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardOutcome {
    /// Delivered on the first attempt
    Sent,
    /// Delivered by the retry policy after the first attempt failed
    SentAfterRetry,
    /// No destination could be selected; nothing was written
    SelectFailed,
    /// First attempt failed and no retry policy is configured
    WriteFailed,
    /// Retry policy ran out of budget
    RetryExhausted,
}

impl ForwardOutcome {
    /// Metric label for this outcome
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::SentAfterRetry => "sent_after_retry",
            Self::SelectFailed => "select_failed",
            Self::WriteFailed => "write_failed",
            Self::RetryExhausted => "retry_exhausted",
        }
    }

    /// True if the message reached a destination
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Sent | Self::SentAfterRetry)
    }
}

impl fmt::Display for ForwardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
