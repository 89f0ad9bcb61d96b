//! # Session state machine.
//!
//! ```text
//! Starting ──► Active ──► Draining ──► Terminated
//!     │           │           ▲             ▲
//!     │           └───────────┘             │
//!     └── unsolicited exit ─────────────────┤
//!                 (from any live state) ────┘
//! ```
//!
//! ## Rules
//! - `Terminated` is absorbing; a session entering it is removed from the
//!   registry and never reused.
//! - Chunks are only forwarded in `Starting`/`Active`.
//! - `Draining` means the worker's input is closed but its exit has not yet
//!   been observed; the termination signal may not have been sent.

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Worker spawn requested, start not yet confirmed.
    Starting,
    /// Worker running and accepting chunks.
    Active,
    /// Input closed, waiting (bounded) for voluntary exit.
    Draining,
    /// Worker exit observed; absorbing.
    Terminated,
}

impl SessionState {
    /// True while chunks may be forwarded to the worker.
    pub fn is_writable(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Active)
    }

    /// True for the absorbing terminal state.
    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        match (self, to) {
            (Starting, Active) => true,
            (Starting | Active, Draining) => true,
            // unsolicited exit may fire from any live state
            (Starting | Active | Draining, Terminated) => true,
            _ => false,
        }
    }

    /// Short stable label (snake_case) for logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Draining => "draining",
            SessionState::Terminated => "terminated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn terminated_is_absorbing() {
        for to in [Starting, Active, Draining, Terminated] {
            assert!(!Terminated.can_transition(to));
        }
    }

    #[test]
    fn live_states_may_terminate() {
        assert!(Starting.can_transition(Terminated));
        assert!(Active.can_transition(Terminated));
        assert!(Draining.can_transition(Terminated));
    }

    #[test]
    fn no_skipping_backwards() {
        assert!(!Draining.can_transition(Active));
        assert!(!Active.can_transition(Starting));
        assert!(!Draining.can_transition(Starting));
    }

    #[test]
    fn writability() {
        assert!(Starting.is_writable());
        assert!(Active.is_writable());
        assert!(!Draining.is_writable());
        assert!(!Terminated.is_writable());
    }
}
