use shared::{
    domain::Message,
    protocol::{HistoryEntry, Summary},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingResponse,
    ToolCallPending,
    AwaitingToolResult,
}

/// Read-only copy of a session handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub epoch: u64,
    pub phase: Phase,
    pub messages: Vec<Message>,
    pub history: Vec<HistoryEntry>,
    /// Set only once the summary's reveal delay has elapsed.
    pub summary: Option<Summary>,
}

/// Message log plus the server-owned conversation history of one chat session.
///
/// Only the orchestrator mutates a session; everything else sees snapshots.
#[derive(Debug)]
pub struct SessionState {
    greeting: String,
    epoch: u64,
    phase: Phase,
    messages: Vec<Message>,
    history: Vec<HistoryEntry>,
    summary: Option<Summary>,
}

impl SessionState {
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Self {
            messages: vec![Message::bot(greeting.clone())],
            greeting,
            epoch: 0,
            phase: Phase::Idle,
            history: Vec::new(),
            summary: None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub(crate) fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Captured summaries stay private until revealed, so the caller passes in
    /// the revealed one.
    pub(crate) fn snapshot(&self, revealed_summary: Option<Summary>) -> SessionSnapshot {
        SessionSnapshot {
            epoch: self.epoch,
            phase: self.phase,
            messages: self.messages.clone(),
            history: self.history.clone(),
            summary: revealed_summary,
        }
    }

    pub(crate) fn append_message(&mut self, message: Message) -> Message {
        self.messages.push(message.clone());
        message
    }

    pub(crate) fn replace_history(&mut self, history: Vec<HistoryEntry>) {
        self.history = history;
    }

    pub(crate) fn set_summary(&mut self, summary: Summary) {
        self.summary = Some(summary);
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Restores the seeded state and starts a new epoch. Returns the new epoch.
    pub(crate) fn reset(&mut self) -> u64 {
        self.epoch += 1;
        self.phase = Phase::Idle;
        self.messages.clear();
        self.messages.push(Message::bot(self.greeting.clone()));
        self.history.clear();
        self.summary = None;
        self.epoch
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
