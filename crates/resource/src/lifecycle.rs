//! Lifecycle state machine shared by every resource and collection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a resource.
///
/// ```text
/// Unopened ──► Opening ──► Opened ──► Closing ──► Closed
///    ▲            │          │  │                   ▲
///    └────────────┘          │  └──► Destroying ────┤
///     (failed open)          └──► Opening (seeded)  │
/// Unopened ─────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Not yet opened, or rolled back after a failed open.
    Unopened,
    /// An open pass is in flight.
    Opening,
    /// Open completed.
    Opened,
    /// A close pass is in flight.
    Closing,
    /// Close completed; terminal.
    Closed,
    /// A destroy (close plus reason) is in flight.
    Destroying,
}

impl Lifecycle {
    /// Every state, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Unopened,
        Self::Opening,
        Self::Opened,
        Self::Closing,
        Self::Closed,
        Self::Destroying,
    ];

    /// States reachable in one step (self-transitions excluded).
    #[must_use]
    pub fn next_states(self) -> &'static [Self] {
        match self {
            Self::Unopened => &[Self::Opening, Self::Closed, Self::Destroying],
            Self::Opening => &[Self::Opened, Self::Unopened],
            Self::Opened => &[Self::Opening, Self::Closing, Self::Destroying],
            Self::Closing => &[Self::Closed],
            Self::Destroying => &[Self::Closed],
            Self::Closed => &[],
        }
    }

    /// Whether moving from `self` to `target` is legal.
    ///
    /// Self-transitions are allowed everywhere except the terminal state.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::Closed, _) => false,
            (from, to) if from == to => true,
            (from, to) => from.next_states().contains(&to),
        }
    }

    /// A pass is in flight.
    #[must_use]
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Opening | Self::Closing | Self::Destroying)
    }

    /// No further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Active use may be registered in this state.
    #[must_use]
    pub fn accepts_active(self) -> bool {
        matches!(self, Self::Opening | Self::Opened)
    }

    /// Close or destroy has started or finished.
    #[must_use]
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::Closing | Self::Closed | Self::Destroying)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unopened => write!(f, "unopened"),
            Self::Opening => write!(f, "opening"),
            Self::Opened => write!(f, "opened"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Destroying => write!(f, "destroying"),
        }
    }
}
