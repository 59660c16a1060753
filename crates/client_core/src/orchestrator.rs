//! Chat turn state machine.
//!
//! A turn is `Idle -> AwaitingResponse -> Idle`, or, when the backend signals a
//! tool call, `Idle -> AwaitingResponse -> ToolCallPending -> AwaitingToolResult -> Idle`.
//! The backend owns the conversation history: every successful round trip
//! replaces the local copy with the one the server returned.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use shared::{
    domain::Message,
    protocol::{ChatReply, ChatRequest, HistoryEntry, Summary, ToolCallResultRequest},
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    error::TransportError,
    protocol_client::ChatBackend,
    session::{Phase, SessionSnapshot, SessionState},
    summary::SummaryHandler,
    types::{SendOutcome, SessionEvent},
};

pub const TOOL_CALL_PLACEHOLDER: &str = "Please wait while I search our inventory.";
pub const GENERIC_ERROR_TEXT: &str =
    "Sorry, I ran into a problem reaching our team. Please try again.";
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub fn time_context_entry(now: DateTime<Utc>) -> HistoryEntry {
    HistoryEntry::system(format!(
        "Current time: {}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    ))
}

pub struct ChatOrchestrator {
    backend: Arc<dyn ChatBackend>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    summary: SummaryHandler,
}

impl ChatOrchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: &Settings) -> Self {
        Self::with_options(
            backend,
            settings.greeting.clone(),
            settings.summary_reveal_delay(),
        )
    }

    pub fn with_options(
        backend: Arc<dyn ChatBackend>,
        greeting: impl Into<String>,
        summary_reveal_delay: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            state: Mutex::new(SessionState::new(greeting)),
            summary: SummaryHandler::new(summary_reveal_delay, events.clone()),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        state.snapshot(self.summary.visible())
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase()
    }

    /// The summary the UI may display, once its reveal delay has passed.
    pub fn visible_summary(&self) -> Option<Summary> {
        self.summary.visible()
    }

    /// Runs one chat turn for `text`.
    ///
    /// Does nothing for blank text or while another turn is in flight. Errors
    /// never escape: they end the turn with a generic bot message.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        let (epoch, request) = {
            let mut state = self.state.lock().await;
            if state.phase() != Phase::Idle {
                debug!(
                    "chat: ignoring message while phase={:?} epoch={}",
                    state.phase(),
                    state.epoch()
                );
                return SendOutcome::Ignored;
            }

            let epoch = state.epoch();
            self.set_phase(&mut state, epoch, Phase::AwaitingResponse);
            self.append(&mut state, epoch, Message::user(text));

            let mut conversation_history = state.history().to_vec();
            conversation_history.push(time_context_entry(Utc::now()));
            conversation_history.push(HistoryEntry::user(text));
            (
                epoch,
                ChatRequest {
                    message: text.to_string(),
                    conversation_history,
                },
            )
        };

        let reply = self
            .backend
            .chat(&request)
            .await
            .and_then(|response| response.into_reply().map_err(TransportError::from));

        let mut state = self.state.lock().await;
        if state.epoch() != epoch {
            debug!(
                "chat: discarding /chat response from epoch={} current={}",
                epoch,
                state.epoch()
            );
            return SendOutcome::Discarded;
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => return self.fail_turn(&mut state, epoch, err),
        };

        match reply {
            ChatReply::Answer {
                text,
                history,
                summary,
            } => {
                state.replace_history(history);
                self.append(&mut state, epoch, Message::bot(text));
                if let Some(summary) = summary {
                    self.capture_summary(&mut state, epoch, summary);
                }
                self.set_phase(&mut state, epoch, Phase::Idle);
                SendOutcome::Completed
            }
            ChatReply::ToolCall { history } => {
                info!(
                    "chat: tool call detected epoch={} history_len={}",
                    epoch,
                    history.len()
                );
                state.replace_history(history.clone());
                self.append(&mut state, epoch, Message::bot(TOOL_CALL_PLACEHOLDER));
                self.set_phase(&mut state, epoch, Phase::ToolCallPending);
                self.set_phase(&mut state, epoch, Phase::AwaitingToolResult);
                drop(state);

                self.resolve_tool_call(epoch, history).await
            }
        }
    }

    async fn resolve_tool_call(&self, epoch: u64, history: Vec<HistoryEntry>) -> SendOutcome {
        let request = ToolCallResultRequest {
            conversation_history: history,
        };
        let result = self.backend.tool_call_result(&request).await;

        let mut state = self.state.lock().await;
        if state.epoch() != epoch {
            debug!(
                "chat: discarding /tool-call-result response from epoch={} current={}",
                epoch,
                state.epoch()
            );
            return SendOutcome::Discarded;
        }

        match result {
            Ok(response) => {
                state.replace_history(response.final_conversation_history);
                self.append(&mut state, epoch, Message::bot(response.final_response));
                if let Some(summary) = response.summary {
                    self.capture_summary(&mut state, epoch, summary);
                }
                self.set_phase(&mut state, epoch, Phase::Idle);
                SendOutcome::Completed
            }
            Err(err) => self.fail_turn(&mut state, epoch, err),
        }
    }

    /// Restores the seeded session. A turn still in flight will have its
    /// result discarded when it lands.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let previous = state.phase();
        let epoch = state.reset();
        self.summary.cancel();
        info!("chat: session reset epoch={epoch} previous_phase={previous:?}");
        let _ = self.events.send(SessionEvent::SessionReset { epoch });
        let _ = self.events.send(SessionEvent::PhaseChanged {
            epoch,
            phase: Phase::Idle,
        });
    }

    fn fail_turn(
        &self,
        state: &mut SessionState,
        epoch: u64,
        err: TransportError,
    ) -> SendOutcome {
        let kind = err.kind();
        warn!(
            "chat: turn failed epoch={} phase={:?} kind={:?}: {}",
            epoch,
            state.phase(),
            kind,
            err
        );
        let _ = self.events.send(SessionEvent::TurnFailed { epoch, kind });
        self.append(state, epoch, Message::bot(GENERIC_ERROR_TEXT));
        self.set_phase(state, epoch, Phase::Idle);
        SendOutcome::Failed(kind)
    }

    fn capture_summary(&self, state: &mut SessionState, epoch: u64, summary: Summary) {
        debug!(
            "chat: summary captured epoch={} department={} replaces_previous={}",
            epoch,
            summary.department,
            state.summary().is_some()
        );
        state.set_summary(summary.clone());
        self.summary.store(summary);
        let _ = self.events.send(SessionEvent::SummaryStored { epoch });
    }

    fn append(&self, state: &mut SessionState, epoch: u64, message: Message) {
        let message = state.append_message(message);
        let _ = self
            .events
            .send(SessionEvent::MessageAppended { epoch, message });
    }

    fn set_phase(&self, state: &mut SessionState, epoch: u64, phase: Phase) {
        state.set_phase(phase);
        let _ = self.events.send(SessionEvent::PhaseChanged { epoch, phase });
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
