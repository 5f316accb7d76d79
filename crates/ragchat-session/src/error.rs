use ragchat_core::CoreError;

use crate::action::{ActionKind, ActionPhase};

/// Errors raised by the session manager itself.
///
/// Remote failures are not represented here: they surface as
/// [`ragchat_client::ServiceError`] or as visible chat messages.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid {kind} transition: {from} -> {to}")]
    InvalidTransition {
        kind: ActionKind,
        from: ActionPhase,
        to: ActionPhase,
    },

    #[error("unknown request #{0}")]
    UnknownRequest(u64),

    #[error("token store error: {0}")]
    Store(#[from] CoreError),
}
