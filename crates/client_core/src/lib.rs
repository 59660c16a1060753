//! Session orchestration for the dealership chat assistant.
//!
//! [`TransportClient`] talks to the chat backend with one-shot failover,
//! [`ChatOrchestrator`] drives a chat turn (including tool-call follow-ups)
//! over any [`ChatBackend`], and publishes [`SessionEvent`]s for the UI.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod protocol_client;
pub mod session;
pub mod summary;
pub mod transport;
pub mod types;

pub use config::{load_settings, Settings};
pub use error::{FailureKind, TransportError};
pub use orchestrator::{ChatOrchestrator, GENERIC_ERROR_TEXT, TOOL_CALL_PLACEHOLDER};
pub use protocol_client::ChatBackend;
pub use session::{Phase, SessionSnapshot, SessionState};
pub use summary::SummaryHandler;
pub use transport::TransportClient;
pub use types::{SendOutcome, SessionEvent};
