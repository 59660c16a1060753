use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{extract::State, routing::post, Json, Router};
use client_core::{
    ChatBackend, ChatOrchestrator, FailureKind, Phase, SendOutcome, TransportClient,
    GENERIC_ERROR_TEXT, TOOL_CALL_PLACEHOLDER,
};
use serde_json::{json, Value};
use shared::{
    domain::Sender,
    protocol::{ChatRequest, HistoryEntry, HistoryRole, ToolCallResultRequest},
};
use tokio::net::TcpListener;

const GREETING: &str = "Hello! How can I help you today?";

#[derive(Clone, Default)]
struct BackendCounters {
    chat: Arc<AtomicUsize>,
    tool: Arc<AtomicUsize>,
}

async fn handle_chat(
    State(counters): State<BackendCounters>,
    Json(body): Json<ChatRequest>,
) -> Json<Value> {
    counters.chat.fetch_add(1, Ordering::SeqCst);
    let mut history = body.conversation_history;
    if !history
        .iter()
        .any(|entry| entry.content_text().starts_with("You are Patricia"))
    {
        history.insert(0, HistoryEntry::system("You are Patricia, the dealership assistant."));
    }

    let message = body.message.to_ascii_lowercase();
    if message.contains("financing") || message.contains("lease") {
        let mut call = HistoryEntry::assistant("Processing your request...");
        call.extra.insert(
            "tool_calls".into(),
            json!([{
                "id": "call_1",
                "type": "function",
                "function": {"name": "search_financing", "arguments": "{}"}
            }]),
        );
        history.push(call);
        return Json(json!({
            "chat_response": "Processing your request...",
            "conversation_history": history,
            "tool_call_detected": true,
            "summary": null
        }));
    }

    history.push(HistoryEntry::assistant("Hi there!"));
    Json(json!({
        "chat_response": "Hi there!",
        "conversation_history": history,
        "tool_call_detected": false,
        "summary": null,
        "token_usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    }))
}

async fn handle_tool_call_result(
    State(counters): State<BackendCounters>,
    Json(body): Json<ToolCallResultRequest>,
) -> Json<Value> {
    counters.tool.fetch_add(1, Ordering::SeqCst);
    let has_tool_call = body
        .conversation_history
        .iter()
        .any(|entry| entry.extra.contains_key("tool_calls"));
    let asks_about_lease = body
        .conversation_history
        .iter()
        .any(|entry| entry.role == HistoryRole::User && entry.content_text().contains("lease"));
    let mut history = body.conversation_history;
    if asks_about_lease {
        return Json(json!({
            "final_conversation_history": history,
            "summary": null
        }));
    }
    let mut tool = HistoryEntry::new(HistoryRole::Tool, "[{\"plan\": \"60 months at 3.9%\"}]");
    tool.extra.insert("tool_call_id".into(), json!("call_1"));
    history.push(tool);
    let text = if has_tool_call {
        "Here are financing options..."
    } else {
        "No tool call found."
    };
    history.push(HistoryEntry::assistant(text));
    Json(json!({
        "final_response": text,
        "final_conversation_history": history,
        "summary": null
    }))
}

async fn spawn_backend(counters: BackendCounters) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/tool-call-result", post(handle_tool_call_result))
        .with_state(counters);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

/// Answers small talk at once but never answers stock questions in time.
async fn spawn_stalling_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<ChatRequest>| async move {
            if body.message.contains("stock") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            let mut history = body.conversation_history;
            history.push(HistoryEntry::assistant("Hi there!"));
            Json(json!({
                "chat_response": "Hi there!",
                "conversation_history": history,
                "tool_call_detected": false
            }))
        }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

fn orchestrator(transport: TransportClient) -> ChatOrchestrator {
    ChatOrchestrator::with_options(
        Arc::new(transport) as Arc<dyn ChatBackend>,
        GREETING,
        Duration::from_secs(2),
    )
}

fn transcript(messages: &[shared::domain::Message]) -> Vec<(Sender, &str)> {
    messages
        .iter()
        .map(|message| (message.sender, message.text.as_str()))
        .collect()
}

#[tokio::test]
async fn scenario_plain_answer() {
    let counters = BackendCounters::default();
    let base = spawn_backend(counters.clone()).await;
    let chat = orchestrator(
        TransportClient::new(&base, &base, Duration::from_secs(5)).expect("transport"),
    );

    assert_eq!(chat.send_message("Hello").await, SendOutcome::Completed);

    let snapshot = chat.snapshot().await;
    assert_eq!(
        transcript(&snapshot.messages),
        vec![
            (Sender::Bot, GREETING),
            (Sender::User, "Hello"),
            (Sender::Bot, "Hi there!"),
        ]
    );
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.history.first().map(|e| e.role), Some(HistoryRole::System));
    assert_eq!(
        snapshot.history.last().map(|e| e.content_text()),
        Some("Hi there!")
    );
    assert_eq!(counters.tool.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_tool_call_follow_up() {
    let counters = BackendCounters::default();
    let base = spawn_backend(counters.clone()).await;
    let chat = orchestrator(
        TransportClient::new(&base, &base, Duration::from_secs(5)).expect("transport"),
    );

    let outcome = chat.send_message("What financing options do you have?").await;
    assert_eq!(outcome, SendOutcome::Completed);

    let snapshot = chat.snapshot().await;
    assert_eq!(
        transcript(&snapshot.messages),
        vec![
            (Sender::Bot, GREETING),
            (Sender::User, "What financing options do you have?"),
            (Sender::Bot, TOOL_CALL_PLACEHOLDER),
            (Sender::Bot, "Here are financing options..."),
        ]
    );
    assert_eq!(counters.chat.load(Ordering::SeqCst), 1);
    assert_eq!(counters.tool.load(Ordering::SeqCst), 1);
    assert!(snapshot
        .history
        .iter()
        .any(|entry| entry.role == HistoryRole::Tool
            && entry.extra.get("tool_call_id") == Some(&json!("call_1"))));
    assert_eq!(snapshot.phase, Phase::Idle);
}

#[tokio::test]
async fn tool_result_without_final_response_fails_the_turn() {
    let counters = BackendCounters::default();
    let base = spawn_backend(counters.clone()).await;
    let chat = orchestrator(
        TransportClient::new(&base, &base, Duration::from_secs(5)).expect("transport"),
    );

    let outcome = chat.send_message("Can I lease a Pathfinder?").await;
    assert_eq!(outcome, SendOutcome::Failed(FailureKind::Protocol));

    let snapshot = chat.snapshot().await;
    assert_eq!(
        transcript(&snapshot.messages),
        vec![
            (Sender::Bot, GREETING),
            (Sender::User, "Can I lease a Pathfinder?"),
            (Sender::Bot, TOOL_CALL_PLACEHOLDER),
            (Sender::Bot, GENERIC_ERROR_TEXT),
        ]
    );
    assert_eq!(counters.tool.load(Ordering::SeqCst), 1);
    assert!(snapshot
        .history
        .iter()
        .any(|entry| entry.extra.contains_key("tool_calls")));
    assert_eq!(snapshot.phase, Phase::Idle);
}

#[tokio::test]
async fn scenario_both_endpoints_time_out() {
    let primary = spawn_stalling_backend().await;
    let backup = spawn_stalling_backend().await;
    let chat = orchestrator(
        TransportClient::new(&primary, &backup, Duration::from_millis(200)).expect("transport"),
    );
    assert_eq!(chat.send_message("Hello").await, SendOutcome::Completed);
    let history_before = chat.snapshot().await.history;
    assert!(!history_before.is_empty());

    let outcome = chat.send_message("Is the Rogue in stock?").await;
    assert!(matches!(outcome, SendOutcome::Failed(_)), "{outcome:?}");

    let snapshot = chat.snapshot().await;
    assert_eq!(
        transcript(&snapshot.messages),
        vec![
            (Sender::Bot, GREETING),
            (Sender::User, "Hello"),
            (Sender::Bot, "Hi there!"),
            (Sender::User, "Is the Rogue in stock?"),
            (Sender::Bot, GENERIC_ERROR_TEXT),
        ]
    );
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.history, history_before);
}

#[tokio::test]
async fn conversation_continues_after_reset() {
    let counters = BackendCounters::default();
    let base = spawn_backend(counters.clone()).await;
    let chat = orchestrator(
        TransportClient::new(&base, &base, Duration::from_secs(5)).expect("transport"),
    );

    chat.send_message("Hello").await;
    chat.reset().await;
    let after_reset = chat.snapshot().await;
    assert_eq!(transcript(&after_reset.messages), vec![(Sender::Bot, GREETING)]);
    assert!(after_reset.history.is_empty());

    assert_eq!(chat.send_message("Hello again").await, SendOutcome::Completed);
    assert_eq!(chat.snapshot().await.messages.len(), 3);
}
