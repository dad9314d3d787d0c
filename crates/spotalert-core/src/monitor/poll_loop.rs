//! The poll-evaluate-notify loop

use chrono::Local;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerting::{AlertSink, ThresholdEvaluator};
use crate::config::PollSettings;
use crate::error::{Error, Result};
use crate::models::{AlertDecision, PollOutcome};
use crate::source::PriceSource;

use super::status;

/// Where the loop is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not started
    Idle,
    /// Fetching the current price
    Polling,
    /// Comparing the price with the threshold
    Evaluating,
    /// Delivering an alert
    Notifying,
    /// Waiting for the next poll
    Sleeping,
    /// Finished; terminal
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Evaluating => "evaluating",
            Self::Notifying => "notifying",
            Self::Sleeping => "sleeping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What one cycle ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No price this cycle
    Unavailable,
    /// Price at or below the threshold
    Normal,
    /// Price above the threshold
    Exceeded {
        /// Whether the alert went out; `None` when alerting is off
        delivered: Option<bool>,
    },
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Cycles started (every cycle runs to completion)
    pub cycles: u64,
    /// Cycles that got no price
    pub unavailable: u64,
    /// Cycles whose price was above the threshold
    pub exceeded: u64,
    /// Alerts the sink accepted
    pub alerts_sent: u64,
    /// Alerts the sink failed to deliver
    pub alerts_failed: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Unavailable => self.unavailable += 1,
            CycleOutcome::Normal => {}
            CycleOutcome::Exceeded { delivered } => {
                self.exceeded += 1;
                match delivered {
                    Some(true) => self.alerts_sent += 1,
                    Some(false) => self.alerts_failed += 1,
                    None => {}
                }
            }
        }
    }
}

/// Polls a price source on a fixed cadence and alerts above the threshold
pub struct PollLoop {
    settings: PollSettings,
    source: Arc<dyn PriceSource>,
    sink: Option<Arc<dyn AlertSink>>,
    evaluator: ThresholdEvaluator,
    out: Box<dyn Write + Send>,
    state: LoopState,
    summary: RunSummary,
}

impl PollLoop {
    /// Create a loop writing status lines to stdout
    ///
    /// A sink is required when alerting is enabled.
    pub fn new(
        settings: PollSettings,
        source: Arc<dyn PriceSource>,
        sink: Option<Arc<dyn AlertSink>>,
    ) -> Result<Self> {
        if settings.alert_enabled() && sink.is_none() {
            return Err(Error::config(
                "alerting is enabled but no notification channel is configured",
            ));
        }

        Ok(Self {
            evaluator: ThresholdEvaluator::new(settings.threshold()),
            settings,
            source,
            sink,
            out: Box::new(std::io::stdout()),
            state: LoopState::Idle,
            summary: RunSummary::default(),
        })
    }

    /// Send status lines somewhere other than stdout
    pub fn with_output(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Settings the loop runs with
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Current state
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Counters so far
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Run until single-shot completion or cancellation
    ///
    /// Cancellation is honoured before each poll and while sleeping; a cycle
    /// in progress always finishes.
    pub async fn run(&mut self, shutdown: &CancellationToken) -> RunSummary {
        info!(
            resource = %self.settings.resource(),
            threshold = %self.settings.threshold(),
            interval_secs = self.settings.poll_interval().as_secs(),
            looping = self.settings.loop_enabled(),
            alerting = self.settings.alert_enabled(),
            "Poll loop started"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested before poll");
                break;
            }

            self.run_cycle().await;

            if !self.settings.loop_enabled() {
                break;
            }

            self.transition(LoopState::Sleeping);
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested while sleeping");
                    break;
                }
                () = tokio::time::sleep(self.settings.poll_interval()) => {}
            }
        }

        self.transition(LoopState::Stopped);
        info!(
            cycles = self.summary.cycles,
            unavailable = self.summary.unavailable,
            exceeded = self.summary.exceeded,
            alerts_sent = self.summary.alerts_sent,
            alerts_failed = self.summary.alerts_failed,
            "Poll loop stopped"
        );

        self.summary
    }

    /// Run one Polling → Evaluating (→ Notifying) pass
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.transition(LoopState::Polling);
        let resource = self.settings.resource().clone();

        let sample = match self.source.fetch_current_price(&resource).await {
            PollOutcome::Observed(sample) => sample,
            PollOutcome::Unavailable(reason) => {
                debug!(reason = %reason, "Skipping evaluation");
                self.emit(&status::unavailable_line(&reason, &Local::now()));
                return self.finish(CycleOutcome::Unavailable);
            }
        };

        self.transition(LoopState::Evaluating);
        let decision = self.evaluator.evaluate(sample);
        debug!(
            price = %sample.value,
            threshold = %decision.threshold(),
            exceeded = decision.is_exceeded(),
            "Evaluated sample"
        );

        if !decision.is_exceeded() {
            self.emit(&status::decision_line(&resource, &decision));
            return self.finish(CycleOutcome::Normal);
        }

        let sink = self.sink.clone().filter(|_| self.settings.alert_enabled());
        let Some(sink) = sink else {
            self.emit(&status::decision_line(&resource, &decision));
            return self.finish(CycleOutcome::Exceeded { delivered: None });
        };

        let delivered = self.notify(sink.as_ref(), &decision).await;
        self.finish(CycleOutcome::Exceeded {
            delivered: Some(delivered),
        })
    }

    async fn notify(&mut self, sink: &dyn AlertSink, decision: &AlertDecision) -> bool {
        let message = status::alert_message(self.settings.resource(), decision);
        self.emit(&status::sending_line(&message, &Local::now()));

        self.transition(LoopState::Notifying);
        match sink.send(&message).await {
            Ok(()) => {
                info!(channel = sink.channel(), "Alert delivered");
                true
            }
            Err(e) => {
                warn!(channel = sink.channel(), error = %e, "Alert delivery failed");
                false
            }
        }
    }

    fn finish(&mut self, outcome: CycleOutcome) -> CycleOutcome {
        self.summary.record(&outcome);
        outcome
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = %self.state, to = %next, "Loop state change");
        self.state = next;
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "Failed to write status line");
        }
    }
}
