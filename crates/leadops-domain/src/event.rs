//! Outbox event lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Delivery status of an outbox event.
///
/// `New` and `Failed` are picked up by the dispatcher. `Sent` is terminal from
/// the dispatcher's point of view; `Acked` is set by the callback receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    New,
    Sent,
    Failed,
    Acked,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [Self::New, Self::Sent, Self::Failed, Self::Acked];

    /// Statuses the dispatcher selects from.
    pub const DISPATCHABLE: [EventStatus; 2] = [Self::New, Self::Failed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Acked => "acked",
        }
    }

    pub fn is_dispatchable(self) -> bool {
        matches!(self, Self::New | Self::Failed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event status: {0}")]
pub struct UnknownEventStatus(pub String);

impl FromStr for EventStatus {
    type Err = UnknownEventStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownEventStatus(s.to_owned()))
    }
}
