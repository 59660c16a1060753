use shared::{domain::Message, protocol::Summary};

use crate::{error::FailureKind, session::Phase};

/// Transition events published by a chat session to any number of observers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged { epoch: u64, phase: Phase },
    MessageAppended { epoch: u64, message: Message },
    /// A turn hit an error; the session goes straight back to `Idle` afterwards.
    TurnFailed { epoch: u64, kind: FailureKind },
    SummaryStored { epoch: u64 },
    SummaryRevealed { summary: Summary },
    SessionReset { epoch: u64 },
}

/// How a `send_message` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank text, or another turn was still in flight. Nothing changed.
    Ignored,
    Completed,
    /// The turn failed and an error message was appended.
    Failed(FailureKind),
    /// The session was reset while the turn was in flight; its result was dropped.
    Discarded,
}
