use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::normalize_base_url, load_settings, ChatBackend, ChatOrchestrator, Phase,
    SessionEvent, TransportClient,
};
use futures::StreamExt;
use shared::{domain::Sender, protocol::Summary};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Terminal client for the dealership chat assistant")]
struct Args {
    /// Settings file; defaults to ./chat_client.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    primary_url: Option<String>,
    #[arg(long)]
    backup_url: Option<String>,
}

const HELP: &str = "commands: /reset, /summary, /analytics, /analytics-reset, \
/analytics-download <file>, /quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = args.primary_url {
        settings.primary_url = normalize_base_url(&url).context("invalid --primary-url")?;
    }
    if let Some(url) = args.backup_url {
        settings.backup_url = normalize_base_url(&url).context("invalid --backup-url")?;
    }
    info!(
        "cli: starting primary={} backup={}",
        settings.primary_url, settings.backup_url
    );

    let transport =
        Arc::new(TransportClient::from_settings(&settings).context("failed to build http client")?);
    let chat = ChatOrchestrator::new(Arc::clone(&transport) as Arc<dyn ChatBackend>, &settings);

    let mut events = chat.event_stream();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => render_event(&event),
                Err(err) => warn!("cli: event stream lagged: {err}"),
            }
        }
    });

    for message in chat.snapshot().await.messages {
        println!("bot> {}", message.text);
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit", _) => break,
            ("/help", _) => println!("{HELP}"),
            ("/reset", _) => chat.reset().await,
            ("/summary", _) => match chat.visible_summary() {
                Some(summary) => print_summary(&summary),
                None => println!("(no summary yet)"),
            },
            ("/analytics", _) => match transport.fetch_analytics_summary().await {
                Ok(summary) => {
                    println!(
                        "requests={} total_cost=${:.4} avg_cost=${:.4} sent_tokens={} received_tokens={}",
                        summary.total_requests,
                        summary.total_cost,
                        summary.average_cost_per_request,
                        summary.total_sent_tokens,
                        summary.total_received_tokens
                    );
                    for (model, cost) in &summary.cost_by_model {
                        println!("  {model}: ${cost:.4}");
                    }
                }
                Err(err) => println!("analytics unavailable: {err}"),
            },
            ("/analytics-reset", _) => match transport.reset_analytics().await {
                Ok(response) => println!(
                    "{}",
                    response
                        .message
                        .unwrap_or_else(|| "analytics reset".to_string())
                ),
                Err(err) => println!("analytics reset failed: {err}"),
            },
            ("/analytics-download", path) if !path.is_empty() => {
                match transport.download_analytics().await {
                    Ok(report) => match tokio::fs::write(path, &report).await {
                        Ok(()) => println!("saved {} bytes to {path}", report.len()),
                        Err(err) => println!("failed to write report to '{path}': {err}"),
                    },
                    Err(err) => println!("analytics download failed: {err}"),
                }
            }
            _ => {
                chat.send_message(line).await;
            }
        }
    }

    printer.abort();
    Ok(())
}

fn render_event(event: &SessionEvent) {
    match event {
        SessionEvent::MessageAppended { message, .. } if message.sender == Sender::Bot => {
            println!("bot> {}", message.text);
        }
        SessionEvent::PhaseChanged {
            phase: Phase::AwaitingResponse,
            ..
        } => println!("..."),
        SessionEvent::SummaryRevealed { summary } => print_summary(summary),
        SessionEvent::SessionReset { .. } => println!("-- new conversation --"),
        _ => {}
    }
}

fn print_summary(summary: &Summary) {
    let keywords: Vec<&str> = summary.keywords.iter().map(String::as_str).collect();
    println!(
        "summary> [{:?}] {} (department: {}, urgency: {}, upsell: {})",
        summary.sentiment,
        summary.summary,
        summary.department,
        summary.insights.urgency,
        summary.insights.upsell_opportunity
    );
    if !keywords.is_empty() {
        println!("summary> keywords: {}", keywords.join(", "));
    }
    if let Some(notes) = &summary.insights.additional_notes {
        println!("summary> notes: {notes}");
    }
}
