//! # Generation Strategies
//!
//! A closed set of raw payload generators. Each iteration picks one strategy
//! uniformly at random from the enabled [`StrategySet`]; nothing carries over
//! between picks.
//!
//! | Strategy        | Length         | Shape                                   |
//! |-----------------|----------------|-----------------------------------------|
//! | `pure-random`   | 1..=128        | uniform noise, may or may not overflow  |
//! | `deep-overflow` | 200            | always reaches past canary + frame      |
//! | `opcode-salad`  | 30..=240       | `[op, r, r]` triplets, `op` from table  |

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::source::ByteSource;

/// Upper bound for [`Strategy::PureRandom`] payloads.
pub const PURE_RANDOM_MAX_LEN: usize = 128;

/// Fixed length of [`Strategy::DeepOverflow`] payloads. Larger than
/// `buffer_size + 4 + 8` for the default layout.
pub const DEEP_OVERFLOW_LEN: usize = 200;

/// Opcode bytes the SecArch-8 CPU decodes as real instructions.
pub const VALID_OPCODES: [u8; 4] = [0x43, 0x04, 0xFF, 0x95];

/// Triplet count bounds for [`Strategy::OpcodeSalad`].
pub const SALAD_MIN_UNITS: usize = 10;
pub const SALAD_MAX_UNITS: usize = 80;

/// Bytes per salad unit: one opcode plus two random operand bytes.
pub const SALAD_UNIT_LEN: usize = 3;

/// Raw payload generator tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Strategy {
    PureRandom,
    DeepOverflow,
    OpcodeSalad,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::PureRandom,
        Strategy::DeepOverflow,
        Strategy::OpcodeSalad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::PureRandom => "pure-random",
            Strategy::DeepOverflow => "deep-overflow",
            Strategy::OpcodeSalad => "opcode-salad",
        }
    }

    /// Produce one fresh raw payload.
    pub fn generate<R: Rng>(&self, source: &mut ByteSource<R>) -> Vec<u8> {
        match self {
            Strategy::PureRandom => pure_random(source),
            Strategy::DeepOverflow => deep_overflow(source),
            Strategy::OpcodeSalad => opcode_salad(source),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strategy `{0}` (expected pure-random, deep-overflow or opcode-salad)")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('_', "-");
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == name)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

impl TryFrom<String> for Strategy {
    type Error = UnknownStrategy;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn pure_random<R: Rng>(source: &mut ByteSource<R>) -> Vec<u8> {
    let len = source.range(1..=PURE_RANDOM_MAX_LEN);
    source.generate(len)
}

fn deep_overflow<R: Rng>(source: &mut ByteSource<R>) -> Vec<u8> {
    source.generate(DEEP_OVERFLOW_LEN)
}

fn opcode_salad<R: Rng>(source: &mut ByteSource<R>) -> Vec<u8> {
    let units = source.range(SALAD_MIN_UNITS..=SALAD_MAX_UNITS);
    let mut payload = Vec::with_capacity(units * SALAD_UNIT_LEN);
    for _ in 0..units {
        payload.push(source.pick(&VALID_OPCODES));
        payload.extend(source.generate(SALAD_UNIT_LEN - 1));
    }
    payload
}

// ─── Strategy Set ───────────────────────────────────────────────────────────

/// The strategies eligible for selection during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySet {
    enabled: Vec<Strategy>,
}

impl StrategySet {
    /// Builds a set from `strategies`, dropping duplicates while keeping the
    /// first-seen order. An empty list is rejected.
    pub fn new(strategies: impl IntoIterator<Item = Strategy>) -> Result<Self, ConfigError> {
        let mut enabled = Vec::new();
        for strategy in strategies {
            if !enabled.contains(&strategy) {
                enabled.push(strategy);
            }
        }
        if enabled.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        Ok(StrategySet { enabled })
    }

    pub fn all() -> Self {
        StrategySet {
            enabled: Strategy::ALL.to_vec(),
        }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.enabled
    }

    /// Uniform, memoryless pick among the enabled strategies. The set is
    /// never empty.
    pub fn select<R: Rng>(&self, source: &mut ByteSource<R>) -> Strategy {
        source.pick(&self.enabled)
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::all()
    }
}
