//! # Run Statistics
//!
//! Counters accumulated by the driver over one run. Serializable so the
//! end-of-run summary can be emitted as JSON.

use serde::Serialize;

use crate::strategy::Strategy;

/// How many times each strategy was picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyCounts {
    pub pure_random: u64,
    pub deep_overflow: u64,
    pub opcode_salad: u64,
}

impl StrategyCounts {
    pub fn record(&mut self, strategy: Strategy) {
        match strategy {
            Strategy::PureRandom => self.pure_random += 1,
            Strategy::DeepOverflow => self.deep_overflow += 1,
            Strategy::OpcodeSalad => self.opcode_salad += 1,
        }
    }

    pub fn get(&self, strategy: Strategy) -> u64 {
        match strategy {
            Strategy::PureRandom => self.pure_random,
            Strategy::DeepOverflow => self.deep_overflow,
            Strategy::OpcodeSalad => self.opcode_salad,
        }
    }

    pub fn total(&self) -> u64 {
        self.pure_random + self.deep_overflow + self.opcode_salad
    }
}

/// Aggregate fuzz-run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Iterations that reached the transport.
    pub packets_attempted: u64,
    /// Datagrams the transport accepted.
    pub packets_sent: u64,
    /// Sends that returned an error.
    pub send_failures: u64,
    /// Total bytes accepted by the transport.
    pub bytes_sent: u64,
    /// Payloads that overflowed the buffer and got the canary rewrite.
    pub payloads_rewritten: u64,
    /// Size of the most recent payload after the rewrite.
    pub last_payload_len: usize,
    /// Per-strategy pick counts.
    pub strategies: StrategyCounts,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of attempts the transport rejected.
    pub fn failure_rate(&self) -> f64 {
        if self.packets_attempted == 0 {
            0.0
        } else {
            self.send_failures as f64 / self.packets_attempted as f64
        }
    }

    /// Folds one iteration's outcome into the counters.
    pub fn record(&mut self, outcome: &IterationOutcome) {
        self.strategies.record(outcome.strategy);
        self.last_payload_len = outcome.payload_len;
        if outcome.rewritten {
            self.payloads_rewritten += 1;
        }
        self.packets_attempted += 1;
        match outcome.status {
            SendStatus::Sent(bytes) => {
                self.packets_sent += 1;
                self.bytes_sent += bytes as u64;
            }
            SendStatus::Failed => self.send_failures += 1,
        }
    }
}

// ─── Iteration Outcome ──────────────────────────────────────────────────────

/// Result of handing one payload to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Sent(usize),
    Failed,
}

/// Everything one fuzz iteration produced, before it is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationOutcome {
    pub strategy: Strategy,
    pub raw_len: usize,
    pub payload_len: usize,
    pub rewritten: bool,
    pub status: SendStatus,
}
