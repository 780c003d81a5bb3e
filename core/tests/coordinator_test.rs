use async_trait::async_trait;
use sotto_core::rephrase::RephraseRequest;
use sotto_core::{
    AnnounceConfig, AnnouncementCoordinator, RawEvent, Rephraser, Result, SottoError, SpeakSink,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

#[derive(Default)]
struct RecordingSink {
    phrases: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn phrases(&self) -> Vec<String> {
        self.phrases.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeakSink for RecordingSink {
    async fn speak(&self, text: &str) -> Result<()> {
        self.phrases.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Sink whose first call fails; later calls record
#[derive(Default)]
struct FlakySink {
    failed_once: Mutex<bool>,
    phrases: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeakSink for FlakySink {
    async fn speak(&self, text: &str) -> Result<()> {
        let mut failed = self.failed_once.lock().unwrap();
        if !*failed {
            *failed = true;
            return Err(SottoError::SpeakSink("audio device busy".into()));
        }
        self.phrases.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Rephraser that never answers; only the timeout path sees it finish
struct StallRephraser;

#[async_trait]
impl Rephraser for StallRephraser {
    async fn rephrase(&self, _request: RephraseRequest) -> Result<String> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

struct FailRephraser;

#[async_trait]
impl Rephraser for FailRephraser {
    async fn rephrase(&self, _request: RephraseRequest) -> Result<String> {
        Err(SottoError::RephraseProvider("backend unavailable".into()))
    }
}

/// Deterministic stand-in for the LLM: uppercases the last message
struct UpperRephraser;

#[async_trait]
impl Rephraser for UpperRephraser {
    async fn rephrase(&self, request: RephraseRequest) -> Result<String> {
        match request {
            RephraseRequest::Progress { messages, .. } => {
                Ok(messages.last().cloned().unwrap_or_default().to_uppercase())
            }
            other => Ok(other.fallback()),
        }
    }
}

fn test_cfg() -> AnnounceConfig {
    AnnounceConfig {
        enable_tool_announcements: false,
        enable_query_intent_announcement: true,
        enable_progress_announcements: true,
        enable_natural_language: false,
        dedup_window_seconds: 3.0,
        batch_window_seconds: 5.0,
        pacing_interval_seconds: 0.1,
        ..Default::default()
    }
}

fn progress(invocation: &str, tool: &str, message: &str) -> RawEvent {
    RawEvent::Progress {
        invocation_id: invocation.into(),
        tool_name: tool.into(),
        message: message.into(),
        progress: None,
        total: None,
    }
}

fn completion(invocation: &str) -> RawEvent {
    RawEvent::Completion {
        invocation_id: invocation.into(),
    }
}

fn coordinator(
    cfg: AnnounceConfig,
    rephraser: Arc<dyn Rephraser>,
) -> (AnnouncementCoordinator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let coord = AnnouncementCoordinator::new(cfg, rephraser, sink.clone());
    (coord, sink)
}

#[tokio::test(start_paused = true)]
async fn duplicate_progress_within_dedup_window_spoken_once() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord
        .on_event(progress("inv-1", "db", "checking schema"))
        .await;
    sleep(Duration::from_millis(500)).await;
    coord
        .on_event(progress("inv-1", "db", "checking schema"))
        .await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(sink.phrases(), vec!["checking schema"]);
    assert_eq!(coord.stats().dropped, 1);
    assert_eq!(coord.stats().spoken, 1);
}

#[tokio::test(start_paused = true)]
async fn progress_outside_batch_window_spoken_separately() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord
        .on_event(progress("inv-1", "db", "fetching rows"))
        .await;
    sleep(Duration::from_secs(6)).await;
    coord
        .on_event(progress("inv-1", "db", "aggregating results"))
        .await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(sink.phrases(), vec!["fetching rows", "aggregating results"]);
}

#[tokio::test(start_paused = true)]
async fn completion_before_speak_discards_everything() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord.on_event(progress("inv-1", "db", "step 1")).await;
    sleep(Duration::from_secs(1)).await;
    coord.on_event(progress("inv-1", "db", "step 2")).await;
    sleep(Duration::from_secs(1)).await;
    coord.on_event(completion("inv-1")).await;
    sleep(Duration::from_secs(10)).await;

    assert!(sink.phrases().is_empty());
    assert_eq!(coord.stats().discarded_after_completion, 2);
    assert_eq!(coord.stats().spoken, 0);
}

#[tokio::test(start_paused = true)]
async fn rephrase_timeout_falls_back_to_raw_text() {
    let cfg = AnnounceConfig {
        enable_natural_language: true,
        rephrase_timeout_ms: 1_000,
        ..test_cfg()
    };
    let (coord, sink) = coordinator(cfg, Arc::new(StallRephraser));

    coord
        .on_event(progress("inv-1", "db", "fetching 200 rows"))
        .await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(sink.phrases(), vec!["fetching 200 rows"]);
}

#[tokio::test(start_paused = true)]
async fn rephrase_provider_error_falls_back_to_raw_text() {
    let cfg = AnnounceConfig {
        enable_natural_language: true,
        ..test_cfg()
    };
    let (coord, sink) = coordinator(cfg, Arc::new(FailRephraser));

    coord
        .on_event(progress("inv-1", "db", "fetching 200 rows"))
        .await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(sink.phrases(), vec!["fetching 200 rows"]);
}

#[tokio::test(start_paused = true)]
async fn natural_language_rephrasing_is_applied() {
    let cfg = AnnounceConfig {
        enable_natural_language: true,
        ..test_cfg()
    };
    let (coord, sink) = coordinator(cfg, Arc::new(UpperRephraser));

    coord
        .on_event(progress("inv-1", "db", "fetching rows"))
        .await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(sink.phrases(), vec!["FETCHING ROWS"]);
}

#[tokio::test(start_paused = true)]
async fn query_intent_disabled_speaks_nothing() {
    let cfg = AnnounceConfig {
        enable_query_intent_announcement: false,
        ..test_cfg()
    };
    let (coord, sink) = coordinator(cfg, Arc::new(StallRephraser));

    coord
        .on_event(RawEvent::QueryIntent {
            user_query: "how did the stores do last week".into(),
            tools_involved: vec!["get_sales".into()],
        })
        .await;
    sleep(Duration::from_secs(2)).await;

    assert!(sink.phrases().is_empty());
    assert_eq!(coord.stats().dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn query_intent_announced_once_per_turn() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    let ev = RawEvent::QueryIntent {
        user_query: "compare this year to last".into(),
        tools_involved: vec![],
    };
    coord.on_event(ev.clone()).await;
    coord.on_event(ev).await;
    sleep(Duration::from_secs(10)).await;

    // A different query starts a new turn
    coord
        .on_event(RawEvent::QueryIntent {
            user_query: "now show me the top stores".into(),
            tools_involved: vec![],
        })
        .await;
    sleep(Duration::from_secs(1)).await;

    assert_eq!(sink.phrases().len(), 2);
    assert_eq!(coord.stats().dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn tool_announce_spoken_when_enabled() {
    let cfg = AnnounceConfig {
        enable_tool_announcements: true,
        ..test_cfg()
    };
    let (coord, sink) = coordinator(cfg, Arc::new(StallRephraser));

    coord
        .on_event(RawEvent::ToolAnnounce {
            invocation_id: "inv-1".into(),
            tool_name: "get_sales".into(),
            description: "Looking up sales totals".into(),
            arguments: serde_json::json!({"store": "London"}),
        })
        .await;
    sleep(Duration::from_secs(1)).await;

    assert_eq!(sink.phrases(), vec!["Looking up sales totals"]);
}

#[tokio::test(start_paused = true)]
async fn completion_is_idempotent() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord.on_event(progress("inv-1", "db", "step 1")).await;
    sleep(Duration::from_secs(1)).await;
    coord.on_event(completion("inv-1")).await;
    coord.on_event(completion("inv-1")).await;
    sleep(Duration::from_secs(10)).await;

    assert!(sink.phrases().is_empty());
    assert_eq!(coord.stats().discarded_after_completion, 1);
}

#[tokio::test(start_paused = true)]
async fn completion_for_unknown_invocation_is_noop() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord.on_event(completion("ghost")).await;
    sleep(Duration::from_secs(1)).await;

    assert!(sink.phrases().is_empty());
    let stats = coord.stats();
    assert_eq!(stats.spoken, 0);
    assert_eq!(stats.discarded_after_completion, 0);
}

#[tokio::test(start_paused = true)]
async fn nothing_spoken_for_invocation_after_completion() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord
        .on_event(progress("inv-1", "db", "fetching rows"))
        .await;
    sleep(Duration::from_secs(6)).await;
    assert_eq!(sink.phrases().len(), 1);

    coord.on_event(completion("inv-1")).await;
    coord.on_event(progress("inv-1", "db", "late update")).await;
    sleep(Duration::from_secs(10)).await;

    // The late event never reaches the sink
    assert_eq!(sink.phrases(), vec!["fetching rows"]);
    assert!(coord.stats().dropped >= 1);
}

#[tokio::test(start_paused = true)]
async fn progress_spoken_in_arrival_order() {
    let cfg = AnnounceConfig {
        batch_window_seconds: 0.5,
        ..test_cfg()
    };
    let (coord, sink) = coordinator(cfg, Arc::new(StallRephraser));

    for msg in ["step one", "step two", "step three"] {
        coord.on_event(progress("inv-1", "db", msg)).await;
        sleep(Duration::from_secs(1)).await;
    }
    sleep(Duration::from_secs(5)).await;

    assert_eq!(sink.phrases(), vec!["step one", "step two", "step three"]);
}

#[tokio::test(start_paused = true)]
async fn burst_of_messages_coalesces_into_one_utterance() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord
        .on_event(progress("inv-1", "db", "processed 10 rows"))
        .await;
    sleep(Duration::from_millis(200)).await;
    coord
        .on_event(progress("inv-1", "db", "processed 10 rows, aggregating"))
        .await;
    sleep(Duration::from_secs(10)).await;

    // The batch folds into a single phrase; without natural language the
    // most recent message wins
    assert_eq!(sink.phrases(), vec!["processed 10 rows, aggregating"]);
}

#[tokio::test(start_paused = true)]
async fn sink_failure_does_not_halt_drain_loop() {
    let sink = Arc::new(FlakySink::default());
    let coord = AnnouncementCoordinator::new(
        test_cfg(),
        Arc::new(StallRephraser),
        sink.clone(),
    );

    coord
        .on_event(progress("inv-1", "db", "fetching rows"))
        .await;
    sleep(Duration::from_secs(6)).await; // first speak fails
    coord
        .on_event(progress("inv-1", "db", "aggregating results"))
        .await;
    sleep(Duration::from_secs(10)).await;

    assert_eq!(
        sink.phrases.lock().unwrap().clone(),
        vec!["aggregating results"]
    );
}

#[tokio::test(start_paused = true)]
async fn granular_messages_are_filtered() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord
        .on_event(progress("inv-1", "db", "Finalizing the aggregation"))
        .await;
    sleep(Duration::from_secs(10)).await;

    assert!(sink.phrases().is_empty());
    assert_eq!(coord.stats().dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn channel_run_loop_processes_events_and_tears_down() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));
    let (tx, rx) = mpsc::channel(16);
    let handle = coord.run(rx);

    tx.send(progress("inv-1", "db", "fetching rows"))
        .await
        .unwrap();
    sleep(Duration::from_secs(6)).await;
    drop(tx);
    handle.await.unwrap();

    assert_eq!(sink.phrases(), vec!["fetching rows"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_discards_pending_messages() {
    let (coord, sink) = coordinator(test_cfg(), Arc::new(StallRephraser));

    coord
        .on_event(progress("inv-1", "db", "fetching rows"))
        .await;
    coord
        .on_event(progress("inv-2", "export", "writing file"))
        .await;
    sleep(Duration::from_secs(1)).await;
    coord.shutdown().await;
    sleep(Duration::from_secs(10)).await;

    assert!(sink.phrases().is_empty());
    assert_eq!(coord.stats().discarded_after_completion, 2);
}
