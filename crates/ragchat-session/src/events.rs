use crate::action::{ActionKind, ActionPhase};

/// Change notifications broadcast after every state mutation.
///
/// Receivers re-read [`crate::SessionManager::view`]; events carry no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// All session state was reset (initialize).
    Reset,
    /// The conversation list, active flag or a preview changed.
    ConversationsChanged,
    /// The timeline gained, replaced or updated entries.
    TimelineChanged,
    DraftChanged,
    ActionStarted(ActionKind),
    ActionFinished { kind: ActionKind, phase: ActionPhase },
    /// Credentials were cleared and state emptied.
    SignedOut,
}
