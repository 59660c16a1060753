use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::protocol::Summary;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::debug;

use crate::types::SessionEvent;

/// Holds the latest conversation summary and reveals it after a fixed delay.
///
/// Each stored summary gets its own scheduled reveal. Storing a newer summary,
/// calling [`SummaryHandler::cancel`], or dropping the handler cancels any
/// reveal that has not fired yet.
pub struct SummaryHandler {
    delay: Duration,
    inner: Arc<Mutex<SummaryState>>,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Default)]
struct SummaryState {
    generation: u64,
    pending: Option<Summary>,
    revealed: Option<Summary>,
    reveal_task: Option<JoinHandle<()>>,
}

impl SummaryState {
    fn invalidate(&mut self) {
        self.generation += 1;
        if let Some(task) = self.reveal_task.take() {
            task.abort();
        }
    }
}

fn lock(state: &Mutex<SummaryState>) -> MutexGuard<'_, SummaryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SummaryHandler {
    pub fn new(delay: Duration, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            delay,
            inner: Arc::new(Mutex::new(SummaryState::default())),
            events,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Must be called from within a tokio runtime.
    pub fn store(&self, summary: Summary) {
        let mut state = lock(&self.inner);
        state.invalidate();
        state.pending = Some(summary);
        let generation = state.generation;

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let delay = self.delay;
        state.reveal_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let revealed = {
                let mut state = lock(&inner);
                if state.generation != generation {
                    return;
                }
                state.reveal_task = None;
                let Some(summary) = state.pending.take() else {
                    return;
                };
                state.revealed = Some(summary.clone());
                summary
            };
            debug!("summary: revealed generation={generation}");
            let _ = events.send(SessionEvent::SummaryRevealed { summary: revealed });
        }));
        debug!(
            "summary: reveal scheduled generation={generation} delay_ms={}",
            delay.as_millis()
        );
    }

    /// Drops the pending and the revealed summary and cancels a scheduled reveal.
    pub fn cancel(&self) {
        let mut state = lock(&self.inner);
        state.invalidate();
        state.pending = None;
        state.revealed = None;
    }

    /// The summary observers may show, if its reveal delay has elapsed.
    pub fn visible(&self) -> Option<Summary> {
        lock(&self.inner).revealed.clone()
    }

    pub fn pending(&self) -> Option<Summary> {
        lock(&self.inner).pending.clone()
    }
}

impl Drop for SummaryHandler {
    fn drop(&mut self) {
        lock(&self.inner).invalidate();
    }
}

#[cfg(test)]
#[path = "tests/summary_tests.rs"]
mod tests;
