//! Lifecycle states for units of archiving work
//!
//! Pages and topics move `Pending → InProgress → Done`; sub-forums move
//! `Pending → Done`. No unit regresses once `Done`.

use std::fmt;

/// Represents the progress of a page, topic or sub-forum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkState {
    /// Nothing archived yet
    Pending,

    /// Some work archived, more remains
    InProgress,

    /// Fully archived; terminal
    Done,
}

impl WorkState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the unit still needs work
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` keeps progress monotonic
    ///
    /// Staying in the same state is allowed; moving backwards is not.
    pub fn can_transition_to(&self, next: WorkState) -> bool {
        next >= *self
    }

    /// Stable lowercase name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    /// Returns all states in lifecycle order
    pub fn all_states() -> [Self; 3] {
        [Self::Pending, Self::InProgress, Self::Done]
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
