//! Identifier of a cart line or wishlist entry.

use core::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage identifier of a cart line or wishlist entry.
///
/// Member carts are rows keyed by UUID. Guest carts live in the visitor's
/// session as JSON arrays and use millisecond timestamps instead.
///
/// Serialized untagged: a UUID string for remote rows, a number for
/// local entries.
///
/// ```
/// use la_red_core::LineId;
///
/// let id = LineId::next_local([LineId::Local(i64::MAX - 1)].iter());
/// assert_eq!(id, LineId::Local(i64::MAX));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineId {
    /// Row identifier in the remote store.
    Remote(Uuid),
    /// Timestamp-based identifier generated for guest storage.
    Local(i64),
}

impl LineId {
    /// Generate a local identifier from the current time.
    ///
    /// The result is strictly greater than every local id in `existing`,
    /// so two additions inside the same millisecond never collide.
    #[must_use]
    pub fn next_local<'a>(existing: impl Iterator<Item = &'a Self>) -> Self {
        let now = Utc::now().timestamp_millis();
        let highest = existing
            .filter_map(|id| match id {
                Self::Local(ms) => Some(*ms),
                Self::Remote(_) => None,
            })
            .max();

        match highest {
            Some(ms) if ms >= now => Self::Local(ms.saturating_add(1)),
            _ => Self::Local(now),
        }
    }

    /// Returns the row UUID for remote identifiers.
    #[must_use]
    pub const fn as_remote(&self) -> Option<Uuid> {
        match self {
            Self::Remote(id) => Some(*id),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Local(ms) => write!(f, "local-{ms}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_next_local_is_monotonic() {
        let first = LineId::next_local(std::iter::empty());
        let second = LineId::next_local([first].iter());
        let third = LineId::next_local([first, second].iter());

        let (LineId::Local(a), LineId::Local(b), LineId::Local(c)) = (first, second, third) else {
            panic!("expected local ids");
        };
        assert!(a < b && b < c);
    }

    #[test]
    fn test_next_local_ignores_remote_ids() {
        let remote = LineId::Remote(Uuid::new_v4());
        assert!(matches!(LineId::next_local([remote].iter()), LineId::Local(_)));
    }

    #[test]
    fn test_untagged_serialization() {
        assert_eq!(serde_json::to_string(&LineId::Local(1700)).unwrap(), "1700");

        let uuid = Uuid::new_v4();
        let json = format!("\"{uuid}\"");
        let parsed: LineId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, LineId::Remote(uuid));

        let parsed: LineId = serde_json::from_str("1700").unwrap();
        assert_eq!(parsed, LineId::Local(1700));
    }
}
