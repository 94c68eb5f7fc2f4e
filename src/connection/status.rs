//! Connection status state machine.

use std::fmt;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle state of a connection.
///
/// ```text
/// Opening ──► Open ──► Closed
///    │          └────► Error
///    ├────────────────► Closed
///    └────────────────► Error
/// ```
///
/// `Closed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Transport not yet confirmed open.
    Opening,
    /// Transport open.
    Open,
    /// Transport closed.
    Closed,
    /// Transport failed.
    Error,
}

impl Status {
    /// Returns `true` for `Closed` and `Error`.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[inline]
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Opening, Self::Open | Self::Closed | Self::Error)
                | (Self::Open, Self::Closed | Self::Error)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opening => "OPENING",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Status; 4] = [Status::Opening, Status::Open, Status::Closed, Status::Error];

    #[test]
    fn test_terminal_states() {
        assert!(!Status::Opening.is_terminal());
        assert!(!Status::Open.is_terminal());
        assert!(Status::Closed.is_terminal());
        assert!(Status::Error.is_terminal());
    }

    #[test]
    fn test_no_transition_leaves_terminal() {
        for from in [Status::Closed, Status::Error] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(Status::Opening.can_transition_to(Status::Open));
        assert!(Status::Open.can_transition_to(Status::Closed));
        assert!(Status::Open.can_transition_to(Status::Error));
        assert!(!Status::Open.can_transition_to(Status::Opening));
        assert!(!Status::Open.can_transition_to(Status::Open));
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::Opening.to_string(), "OPENING");
        assert_eq!(Status::Error.to_string(), "ERROR");
    }
}
