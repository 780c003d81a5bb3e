// Voice Agent demo
//
// Wires the announcement engine to a local TTS sink and replays a scripted
// tool invocation so the pacing, batching, and dedup behavior can be heard.
// Run with RUST_LOG=info (or announce=debug for gate decisions).

mod config;
mod speak;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sotto_core::{AnnouncementCoordinator, LlmRephraser, RawEvent, Rephraser, SpeakSink};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::VoiceAgentConfig;
use speak::EspeakSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = VoiceAgentConfig::load();
    info!(
        target: "voice_agent",
        natural_language = cfg.announce.enable_natural_language,
        model = %cfg.rephraser.model,
        "Starting voice agent demo"
    );

    let rephraser: Arc<dyn Rephraser> = Arc::new(LlmRephraser::new(cfg.rephraser.clone())?);
    let sink: Arc<dyn SpeakSink> = Arc::new(EspeakSink::new());
    let coordinator = AnnouncementCoordinator::new(cfg.announce.clone(), rephraser, sink);

    let (tx, rx) = mpsc::channel::<RawEvent>(64);
    let handle = coordinator.run(rx);

    // Scripted replay of one tool-calling turn. The duplicate progress
    // message and the rapid burst exercise the dedup and batch windows.
    let script: Vec<(u64, RawEvent)> = vec![
        (
            0,
            RawEvent::QueryIntent {
                user_query: "compare last month's sales to the forecast".into(),
                tools_involved: vec!["query_database".into(), "aggregate".into()],
            },
        ),
        (
            300,
            RawEvent::ToolAnnounce {
                invocation_id: "inv-1".into(),
                tool_name: "query_database".into(),
                description: "Runs a read-only SQL query".into(),
                arguments: json!({"table": "sales", "month": "2026-07"}),
            },
        ),
        (
            500,
            RawEvent::Progress {
                invocation_id: "inv-1".into(),
                tool_name: "query_database".into(),
                message: "Connecting to database".into(),
                progress: None,
                total: None,
            },
        ),
        (
            900,
            RawEvent::Progress {
                invocation_id: "inv-1".into(),
                tool_name: "query_database".into(),
                message: "Connecting to database".into(),
                progress: None,
                total: None,
            },
        ),
        (
            1400,
            RawEvent::Progress {
                invocation_id: "inv-1".into(),
                tool_name: "query_database".into(),
                message: "Fetching sales rows".into(),
                progress: Some(1.0),
                total: Some(3.0),
            },
        ),
        (
            1700,
            RawEvent::Progress {
                invocation_id: "inv-1".into(),
                tool_name: "query_database".into(),
                message: "Fetching sales rows, joining forecast".into(),
                progress: Some(2.0),
                total: Some(3.0),
            },
        ),
        (
            7000,
            RawEvent::Progress {
                invocation_id: "inv-1".into(),
                tool_name: "query_database".into(),
                message: "Aggregating results".into(),
                progress: Some(3.0),
                total: Some(3.0),
            },
        ),
        (
            9000,
            RawEvent::Completion {
                invocation_id: "inv-1".into(),
            },
        ),
    ];

    let mut elapsed = 0u64;
    for (at_ms, event) in script {
        if at_ms > elapsed {
            sleep(Duration::from_millis(at_ms - elapsed)).await;
            elapsed = at_ms;
        }
        tx.send(event).await?;
    }

    // Give the final batch window time to play out before teardown
    sleep(Duration::from_secs(6)).await;
    drop(tx);
    handle.await?;

    let stats = coordinator.stats();
    info!(
        target: "voice_agent",
        stats = %serde_json::to_string(&stats)?,
        "Session finished"
    );
    Ok(())
}
