//! # Fuzz Driver
//!
//! Runs the generate → bypass → send loop one iteration at a time.
//!
//! ```text
//! Idle → Running → Completed
//!                ↘ Interrupted
//! ```
//!
//! Send failures are counted and logged but never stop the run: the target
//! going away mid-run is the outcome being looked for. Cancellation is
//! cooperative and checked only between iterations, so an in-flight send
//! always finishes first.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::layout::TargetLayout;
use crate::source::ByteSource;
use crate::stats::{IterationOutcome, RunStatistics, SendStatus};
use crate::strategy::StrategySet;
use crate::transport::Transport;

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverState {
    #[default]
    Idle,
    Running,
    Completed,
    Interrupted,
}

impl DriverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverState::Idle => "idle",
            DriverState::Running => "running",
            DriverState::Completed => "completed",
            DriverState::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver cannot start from state `{0}`")]
    AlreadyStarted(DriverState),
}

/// Per-run knobs that are not part of the target layout.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub target: SocketAddr,
    /// Pause between consecutive iterations.
    pub delay: Duration,
    /// Log progress every N iterations; 0 disables.
    pub progress_every: u64,
}

/// Terminal state and final counters of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub state: DriverState,
    pub stats: RunStatistics,
}

pub struct FuzzDriver<T, R> {
    transport: T,
    source: ByteSource<R>,
    strategies: StrategySet,
    layout: TargetLayout,
    options: RunOptions,
    state: DriverState,
    stats: RunStatistics,
}

impl<T: Transport, R: Rng> FuzzDriver<T, R> {
    pub fn new(
        transport: T,
        source: ByteSource<R>,
        strategies: StrategySet,
        layout: TargetLayout,
        options: RunOptions,
    ) -> Self {
        FuzzDriver {
            transport,
            source,
            strategies,
            layout,
            options,
            state: DriverState::Idle,
            stats: RunStatistics::new(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Runs up to `count` iterations while `running` stays `true`.
    ///
    /// A driver runs once; calling this again returns
    /// [`DriverError::AlreadyStarted`].
    pub fn run(&mut self, count: u64, running: &AtomicBool) -> Result<RunSummary, DriverError> {
        if self.state != DriverState::Idle {
            return Err(DriverError::AlreadyStarted(self.state));
        }
        self.state = DriverState::Running;

        info!(
            target_addr = %self.options.target,
            count,
            buffer_size = self.layout.buffer_size(),
            canary = %format!("{:#010X}", self.layout.canary_value()),
            strategies = self.strategies.strategies().len(),
            "fuzz run starting"
        );

        for iteration in 0..count {
            if iteration > 0 && !self.options.delay.is_zero() {
                std::thread::sleep(self.options.delay);
            }
            if !running.load(Ordering::Relaxed) {
                info!(iteration, "fuzzing interrupted");
                self.state = DriverState::Interrupted;
                break;
            }

            let outcome = self.step(iteration);
            self.stats.record(&outcome);

            if self.options.progress_every > 0 && iteration % self.options.progress_every == 0 {
                info!(
                    sent = iteration,
                    last_size = outcome.payload_len,
                    "progress"
                );
            }
        }

        if self.state == DriverState::Running {
            self.state = DriverState::Completed;
        }

        info!(
            state = %self.state,
            attempted = self.stats.packets_attempted,
            sent = self.stats.packets_sent,
            failures = self.stats.send_failures,
            rewritten = self.stats.payloads_rewritten,
            bytes = self.stats.bytes_sent,
            failure_rate = self.stats.failure_rate(),
            "fuzz run finished"
        );

        Ok(RunSummary {
            state: self.state,
            stats: self.stats.clone(),
        })
    }

    /// One iteration: pick, generate, rewrite, send.
    fn step(&mut self, iteration: u64) -> IterationOutcome {
        let strategy = self.strategies.select(&mut self.source);
        let raw = Bytes::from(strategy.generate(&mut self.source));
        let raw_len = raw.len();
        let rewritten = self.layout.overflows(raw_len);
        let payload = self.layout.apply(raw);

        debug!(
            iteration,
            %strategy,
            raw_len,
            len = payload.len(),
            rewritten,
            "payload ready"
        );

        let status = match self.transport.send(self.options.target, &payload) {
            Ok(n) => SendStatus::Sent(n),
            Err(e) => {
                warn!(iteration, error = %e, "send failed");
                SendStatus::Failed
            }
        };

        IterationOutcome {
            strategy,
            raw_len,
            payload_len: payload.len(),
            rewritten,
            status,
        }
    }
}
