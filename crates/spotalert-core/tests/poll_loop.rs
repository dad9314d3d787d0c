//! Poll loop behaviour against scripted collaborators

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use spotalert::alerting::{AlertSink, SinkError};
use spotalert::models::{PollOutcome, PriceSample, ResourceId, UnavailableReason};
use spotalert::monitor::{LoopState, PollLoop, RunSummary};
use spotalert::source::PriceSource;
use spotalert::PollSettings;

/// Replays outcomes in order, then repeats the last one
struct ScriptedSource {
    outcomes: Mutex<VecDeque<PollOutcome>>,
    last: Mutex<Option<PollOutcome>>,
    polled_at: Mutex<Vec<Instant>>,
    /// Cancel this token once this many polls have happened
    stop_after: Option<(usize, CancellationToken)>,
}

impl ScriptedSource {
    fn new(outcomes: Vec<PollOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            last: Mutex::new(None),
            polled_at: Mutex::new(Vec::new()),
            stop_after: None,
        }
    }

    fn stopping_after(mut self, polls: usize, token: CancellationToken) -> Self {
        self.stop_after = Some((polls, token));
        self
    }

    fn polls(&self) -> usize {
        self.polled_at.lock().unwrap().len()
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch_current_price(&self, _resource: &ResourceId) -> PollOutcome {
        let count = {
            let mut polled_at = self.polled_at.lock().unwrap();
            polled_at.push(Instant::now());
            polled_at.len()
        };

        if let Some((limit, token)) = &self.stop_after {
            if count >= *limit {
                token.cancel();
            }
        }

        let next = self.outcomes.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(outcome) = next {
            *last = Some(outcome);
        }
        (*last)
            .clone()
            .unwrap_or(PollOutcome::Unavailable(UnavailableReason::EmptyHistory))
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn channel(&self) -> &str {
        "recording"
    }

    fn destination(&self) -> String {
        "memory".to_string()
    }

    async fn send(&self, message: &str) -> Result<(), SinkError> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            Err(SinkError::Http("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn observed(value: Decimal) -> PollOutcome {
    PollOutcome::Observed(PriceSample::now(value))
}

fn settings(looping: bool, alerting: bool, interval: Duration) -> PollSettings {
    PollSettings::new(
        ResourceId::default(),
        dec!(2.80),
        interval,
        looping,
        alerting,
    )
    .unwrap()
}

struct Harness {
    poll_loop: PollLoop,
    source: Arc<ScriptedSource>,
    sink: Arc<RecordingSink>,
    output: SharedBuffer,
}

fn harness(settings: PollSettings, source: ScriptedSource, sink: RecordingSink) -> Harness {
    let source = Arc::new(source);
    let sink = Arc::new(sink);
    let output = SharedBuffer::default();

    let poll_loop = PollLoop::new(
        settings,
        Arc::clone(&source) as Arc<dyn PriceSource>,
        Some(Arc::clone(&sink) as Arc<dyn AlertSink>),
    )
    .unwrap()
    .with_output(output.clone());

    Harness {
        poll_loop,
        source,
        sink,
        output,
    }
}

#[tokio::test]
async fn test_exceeded_price_sends_one_alert() {
    let mut h = harness(
        settings(false, true, Duration::from_secs(300)),
        ScriptedSource::new(vec![observed(dec!(3.00))]),
        RecordingSink::default(),
    );

    let summary = h.poll_loop.run(&CancellationToken::new()).await;

    let messages = h.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("3.0"));
    assert!(messages[0].contains("2.8"));
    assert_eq!(summary.alerts_sent, 1);
    assert_eq!(h.poll_loop.state(), LoopState::Stopped);

    let lines = h.output.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Sending alert: 'Alert! r3.8xlarge"));
}

#[tokio::test]
async fn test_price_equal_to_threshold_does_not_alert() {
    let mut h = harness(
        settings(false, true, Duration::from_secs(300)),
        ScriptedSource::new(vec![observed(dec!(2.80))]),
        RecordingSink::default(),
    );

    let summary = h.poll_loop.run(&CancellationToken::new()).await;

    assert!(h.sink.messages().is_empty());
    assert_eq!(summary.exceeded, 0);
    assert_eq!(summary.cycles, 1);

    let lines = h.output.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("r3.8xlarge (us-west-2b, Linux/UNIX) price: $2.8"));
}

#[tokio::test]
async fn test_alerting_disabled_flags_status_line_only() {
    let source = ScriptedSource::new(vec![observed(dec!(3.50))]);
    let output = SharedBuffer::default();
    let mut poll_loop = PollLoop::new(
        settings(false, false, Duration::from_secs(300)),
        Arc::new(source),
        None,
    )
    .unwrap()
    .with_output(output.clone());

    let summary = poll_loop.run(&CancellationToken::new()).await;

    assert_eq!(summary.exceeded, 1);
    assert_eq!(summary.alerts_sent + summary.alerts_failed, 0);
    let lines = output.lines();
    assert!(lines[0].ends_with("Alert! r3.8xlarge (us-west-2b, Linux/UNIX) price: $3.5 > $2.8"));
}

#[tokio::test]
async fn test_unavailable_single_shot_ends_after_one_cycle() {
    let mut h = harness(
        settings(false, true, Duration::from_secs(300)),
        ScriptedSource::new(vec![PollOutcome::Unavailable(UnavailableReason::EmptyHistory)]),
        RecordingSink::default(),
    );

    let summary = h.poll_loop.run(&CancellationToken::new()).await;

    assert_eq!(
        summary,
        RunSummary {
            cycles: 1,
            unavailable: 1,
            ..RunSummary::default()
        }
    );
    assert_eq!(h.source.polls(), 1);
    assert!(h.sink.messages().is_empty());

    let lines = h.output.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Price not available: price history is empty"));
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_cycle_does_not_stop_the_loop() {
    let token = CancellationToken::new();
    let mut h = harness(
        settings(true, true, Duration::from_secs(300)),
        ScriptedSource::new(vec![
            PollOutcome::Unavailable(UnavailableReason::Transport("timed out".to_string())),
            observed(dec!(3.00)),
        ])
        .stopping_after(2, token.clone()),
        RecordingSink::default(),
    );

    let summary = h.poll_loop.run(&token).await;

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.unavailable, 1);
    assert_eq!(summary.alerts_sent, 1);
    assert_eq!(h.sink.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_keeps_looping() {
    let token = CancellationToken::new();
    let mut h = harness(
        settings(true, true, Duration::from_secs(60)),
        ScriptedSource::new(vec![observed(dec!(3.00))]).stopping_after(3, token.clone()),
        RecordingSink::failing(),
    );

    let summary = h.poll_loop.run(&token).await;

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.alerts_failed, 3);
    assert_eq!(h.sink.messages().len(), 3);
    assert_eq!(h.poll_loop.state(), LoopState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_every_exceeding_poll_alerts_again() {
    let token = CancellationToken::new();
    let mut h = harness(
        settings(true, true, Duration::from_secs(120)),
        ScriptedSource::new(vec![
            observed(dec!(3.00)),
            observed(dec!(3.10)),
            observed(dec!(1.00)),
            observed(dec!(3.20)),
        ])
        .stopping_after(4, token.clone()),
        RecordingSink::default(),
    );

    let summary = h.poll_loop.run(&token).await;

    assert_eq!(summary.cycles, 4);
    assert_eq!(summary.exceeded, 3);
    assert_eq!(h.sink.messages().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_polls_are_spaced_by_the_clamped_interval() {
    let token = CancellationToken::new();
    let mut h = harness(
        settings(true, false, Duration::from_secs(10)),
        ScriptedSource::new(vec![observed(dec!(1.00))]).stopping_after(3, token.clone()),
        RecordingSink::default(),
    );
    assert_eq!(h.poll_loop.settings().poll_interval(), Duration::from_secs(60));

    h.poll_loop.run(&token).await;

    let polled_at = h.source.polled_at.lock().unwrap().clone();
    assert_eq!(polled_at.len(), 3);
    for pair in polled_at.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(60), "gap was {gap:?}");
        assert!(gap < Duration::from_secs(61), "gap was {gap:?}");
    }
}

#[tokio::test]
async fn test_cancel_while_sleeping_stops_promptly() {
    let token = CancellationToken::new();
    let mut h = harness(
        settings(true, false, Duration::from_secs(3600)),
        ScriptedSource::new(vec![observed(dec!(1.00))]),
        RecordingSink::default(),
    );

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), h.poll_loop.run(&token))
        .await
        .expect("loop should stop soon after cancellation");

    assert_eq!(summary.cycles, 1);
    assert_eq!(h.poll_loop.state(), LoopState::Stopped);
}

#[tokio::test]
async fn test_cancelled_before_start_never_polls() {
    let token = CancellationToken::new();
    token.cancel();
    let mut h = harness(
        settings(true, true, Duration::from_secs(60)),
        ScriptedSource::new(vec![observed(dec!(3.00))]),
        RecordingSink::default(),
    );

    let summary = h.poll_loop.run(&token).await;

    assert_eq!(summary, RunSummary::default());
    assert_eq!(h.source.polls(), 0);
}

#[test]
fn test_alerting_without_sink_is_rejected() {
    let result = PollLoop::new(
        settings(false, true, Duration::from_secs(60)),
        Arc::new(ScriptedSource::new(vec![])),
        None,
    );

    assert!(result.err().is_some_and(|e| e.is_configuration()));
}
