//! Per-action lifecycle and request tagging.
//!
//! Every user intent that reaches the network is tracked as one action:
//! - Idle -> Requesting (remote call issued)
//! - Requesting -> Reconciled (result merged into state, or dropped as stale)
//! - Requesting -> Reported (failure surfaced to the caller or the timeline)
//! - Reconciled | Reported -> Idle (action retired)
//!
//! There is no cancelled state: an issued request always runs to completion.

use std::collections::HashMap;
use std::fmt;

use ragchat_core::ConversationId;

use crate::error::SessionError;

/// The kinds of remote-backed actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Initialize,
    Create,
    Select,
    Send,
    Upload,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Initialize => write!(f, "initialize"),
            ActionKind::Create => write!(f, "create"),
            ActionKind::Select => write!(f, "select"),
            ActionKind::Send => write!(f, "send"),
            ActionKind::Upload => write!(f, "upload"),
        }
    }
}

/// Lifecycle phase of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionPhase {
    Idle,
    Requesting,
    Reconciled,
    Reported,
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPhase::Idle => write!(f, "Idle"),
            ActionPhase::Requesting => write!(f, "Requesting"),
            ActionPhase::Reconciled => write!(f, "Reconciled"),
            ActionPhase::Reported => write!(f, "Reported"),
        }
    }
}

impl ActionPhase {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &ActionPhase) -> bool {
        matches!(
            (self, target),
            (ActionPhase::Idle, ActionPhase::Requesting)
                | (ActionPhase::Requesting, ActionPhase::Reconciled)
                | (ActionPhase::Requesting, ActionPhase::Reported)
                | (ActionPhase::Reconciled, ActionPhase::Idle)
                | (ActionPhase::Reported, ActionPhase::Idle)
        )
    }
}

// =============================================================================
// Tracker
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct InFlight {
    kind: ActionKind,
    phase: ActionPhase,
}

impl InFlight {
    fn transition(&mut self, target: ActionPhase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(&target) {
            return Err(SessionError::InvalidTransition {
                kind: self.kind,
                from: self.phase,
                to: target,
            });
        }
        tracing::debug!(kind = %self.kind, "Action state: {} -> {}", self.phase, target);
        self.phase = target;
        Ok(())
    }
}

/// Bookkeeping for all in-flight actions. Actions do not exclude each other.
#[derive(Debug, Default)]
pub struct ActionTracker {
    next_seq: u64,
    in_flight: HashMap<u64, InFlight>,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new action in `Requesting` and return its sequence number.
    pub fn begin(&mut self, kind: ActionKind) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        tracing::debug!(kind = %kind, seq, "Action state: {} -> {}", ActionPhase::Idle, ActionPhase::Requesting);
        self.in_flight.insert(
            seq,
            InFlight {
                kind,
                phase: ActionPhase::Requesting,
            },
        );
        seq
    }

    /// Move an action to its outcome phase and retire it.
    pub fn finish(&mut self, seq: u64, outcome: ActionPhase) -> Result<ActionKind, SessionError> {
        let action = self
            .in_flight
            .get_mut(&seq)
            .ok_or(SessionError::UnknownRequest(seq))?;
        action.transition(outcome)?;
        action.transition(ActionPhase::Idle)?;
        let kind = action.kind;
        self.in_flight.remove(&seq);
        Ok(kind)
    }

    /// Whether any request is in flight.
    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Number of in-flight requests of one kind.
    pub fn pending(&self, kind: ActionKind) -> usize {
        self.in_flight.values().filter(|a| a.kind == kind).count()
    }
}

// =============================================================================
// Request tags
// =============================================================================

/// Where the session stood at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCursor {
    /// Advanced by every reset (initialize, sign-out).
    pub epoch: u64,
    /// Advanced by every select and every applied create.
    pub selection: u64,
    pub active: Option<ConversationId>,
}

/// Why a response no longer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// The session was reset after the request was issued.
    Reset,
    /// A newer selection replaced the one this request was made for.
    Superseded,
    /// The active conversation changed while the request was in flight.
    ConversationChanged,
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::Reset => write!(f, "session reset"),
            Staleness::Superseded => write!(f, "superseded by a newer selection"),
            Staleness::ConversationChanged => write!(f, "active conversation changed"),
        }
    }
}

/// Identity of an issued request, captured at issue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTag {
    pub seq: u64,
    pub kind: ActionKind,
    pub issued: SessionCursor,
}

impl RequestTag {
    /// Decide whether a response to this request still applies to `now`.
    ///
    /// A reset always invalidates. The remaining checks run only when
    /// `discard_stale` is set.
    pub fn staleness(&self, now: &SessionCursor, discard_stale: bool) -> Option<Staleness> {
        if self.issued.epoch != now.epoch {
            return Some(Staleness::Reset);
        }
        if !discard_stale {
            return None;
        }
        match self.kind {
            ActionKind::Initialize | ActionKind::Create => None,
            ActionKind::Select => {
                (self.issued.selection != now.selection).then_some(Staleness::Superseded)
            }
            ActionKind::Send | ActionKind::Upload => {
                (self.issued.active != now.active).then_some(Staleness::ConversationChanged)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(ActionPhase::Idle.to_string(), "Idle");
        assert_eq!(ActionPhase::Requesting.to_string(), "Requesting");
        assert_eq!(ActionPhase::Reconciled.to_string(), "Reconciled");
        assert_eq!(ActionPhase::Reported.to_string(), "Reported");
        assert_eq!(ActionKind::Upload.to_string(), "upload");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(ActionPhase::Idle.can_transition_to(&ActionPhase::Requesting));
        assert!(ActionPhase::Requesting.can_transition_to(&ActionPhase::Reconciled));
        assert!(ActionPhase::Requesting.can_transition_to(&ActionPhase::Reported));
        assert!(ActionPhase::Reconciled.can_transition_to(&ActionPhase::Idle));
        assert!(ActionPhase::Reported.can_transition_to(&ActionPhase::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        // No shortcut past the request
        assert!(!ActionPhase::Idle.can_transition_to(&ActionPhase::Reconciled));
        assert!(!ActionPhase::Idle.can_transition_to(&ActionPhase::Reported));

        // No cancel
        assert!(!ActionPhase::Requesting.can_transition_to(&ActionPhase::Idle));

        // Outcomes are final
        assert!(!ActionPhase::Reconciled.can_transition_to(&ActionPhase::Reported));
        assert!(!ActionPhase::Reported.can_transition_to(&ActionPhase::Requesting));
    }

    #[test]
    fn test_tracker_lifecycle() {
        let mut tracker = ActionTracker::new();
        assert!(!tracker.is_busy());

        let send = tracker.begin(ActionKind::Send);
        let upload = tracker.begin(ActionKind::Upload);
        assert_ne!(send, upload);
        assert!(tracker.is_busy());
        assert_eq!(tracker.pending(ActionKind::Send), 1);

        assert_eq!(tracker.finish(send, ActionPhase::Reconciled).unwrap(), ActionKind::Send);
        assert!(tracker.is_busy());
        assert_eq!(tracker.finish(upload, ActionPhase::Reported).unwrap(), ActionKind::Upload);
        assert!(!tracker.is_busy());
    }

    #[test]
    fn test_tracker_rejects_bad_finish() {
        let mut tracker = ActionTracker::new();
        let seq = tracker.begin(ActionKind::Select);

        let err = tracker.finish(seq, ActionPhase::Idle).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        // Still in flight after a rejected transition.
        assert!(tracker.is_busy());

        tracker.finish(seq, ActionPhase::Reconciled).unwrap();
        let err = tracker.finish(seq, ActionPhase::Reconciled).unwrap_err();
        assert!(matches!(err, SessionError::UnknownRequest(_)));
    }

    fn cursor(epoch: u64, selection: u64, active: Option<&str>) -> SessionCursor {
        SessionCursor {
            epoch,
            selection,
            active: active.map(ConversationId::from),
        }
    }

    fn tag(kind: ActionKind, issued: SessionCursor) -> RequestTag {
        RequestTag { seq: 1, kind, issued }
    }

    #[test]
    fn test_reset_invalidates_everything() {
        for kind in [
            ActionKind::Initialize,
            ActionKind::Create,
            ActionKind::Select,
            ActionKind::Send,
            ActionKind::Upload,
        ] {
            let t = tag(kind, cursor(1, 0, Some("1")));
            assert_eq!(t.staleness(&cursor(2, 0, Some("1")), true), Some(Staleness::Reset));
            assert_eq!(t.staleness(&cursor(2, 0, Some("1")), false), Some(Staleness::Reset));
        }
    }

    #[test]
    fn test_select_superseded() {
        let t = tag(ActionKind::Select, cursor(1, 3, Some("a")));
        assert_eq!(t.staleness(&cursor(1, 3, Some("a")), true), None);
        assert_eq!(
            t.staleness(&cursor(1, 4, Some("a")), true),
            Some(Staleness::Superseded)
        );
        assert_eq!(t.staleness(&cursor(1, 4, Some("b")), false), None);
    }

    #[test]
    fn test_send_requires_same_conversation() {
        let t = tag(ActionKind::Send, cursor(1, 3, Some("a")));
        // Re-selecting the same conversation does not invalidate a send.
        assert_eq!(t.staleness(&cursor(1, 5, Some("a")), true), None);
        assert_eq!(
            t.staleness(&cursor(1, 5, Some("b")), true),
            Some(Staleness::ConversationChanged)
        );
        assert_eq!(t.staleness(&cursor(1, 5, Some("b")), false), None);
    }

    #[test]
    fn test_create_survives_selection_changes() {
        let t = tag(ActionKind::Create, cursor(1, 0, None));
        assert_eq!(t.staleness(&cursor(1, 9, Some("z")), true), None);
    }
}
