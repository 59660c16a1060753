use super::*;
use shared::protocol::{Insights, Sentiment};
use tokio::{sync::broadcast::error::TryRecvError, time::Instant};

fn sample_summary(department: &str) -> Summary {
    Summary {
        sentiment: Sentiment::Neutral,
        keywords: ["trade-in".to_string()].into_iter().collect(),
        summary: "Customer asked about trade-in value.".into(),
        department: department.into(),
        insights: Insights {
            urgency: "low".into(),
            upsell_opportunity: false,
            customer_interest: "trade-in".into(),
            additional_notes: None,
        },
    }
}

#[tokio::test(start_paused = true)]
async fn reveals_summary_only_after_delay() {
    let (events, mut rx) = broadcast::channel(16);
    let handler = SummaryHandler::new(Duration::from_secs(2), events);
    let started = Instant::now();

    handler.store(sample_summary("sales"));
    assert!(handler.visible().is_none());
    assert!(handler.pending().is_some());

    let event = rx.recv().await.expect("reveal event");
    assert!(started.elapsed() >= Duration::from_secs(2));
    match event {
        SessionEvent::SummaryRevealed { summary } => assert_eq!(summary.department, "sales"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(
        handler.visible().map(|s| s.department),
        Some("sales".to_string())
    );
    assert!(handler.pending().is_none());
}

#[tokio::test(start_paused = true)]
async fn cancel_prevents_stale_reveal() {
    let (events, mut rx) = broadcast::channel(16);
    let handler = SummaryHandler::new(Duration::from_secs(2), events);

    handler.store(sample_summary("service"));
    tokio::time::sleep(Duration::from_millis(500)).await;
    handler.cancel();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(handler.visible().is_none());
    assert!(handler.pending().is_none());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn newer_summary_restarts_the_delay() {
    let (events, mut rx) = broadcast::channel(16);
    let handler = SummaryHandler::new(Duration::from_secs(2), events);
    let started = Instant::now();

    handler.store(sample_summary("sales"));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    handler.store(sample_summary("finance"));

    let event = rx.recv().await.expect("reveal event");
    assert!(started.elapsed() >= Duration::from_millis(3500));
    match event {
        SessionEvent::SummaryRevealed { summary } => assert_eq!(summary.department, "finance"),
        other => panic!("unexpected event: {other:?}"),
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn dropping_handler_cancels_scheduled_reveal() {
    let (events, mut rx) = broadcast::channel(16);
    let handler = SummaryHandler::new(Duration::from_secs(2), events.clone());

    handler.store(sample_summary("parts"));
    drop(handler);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}
