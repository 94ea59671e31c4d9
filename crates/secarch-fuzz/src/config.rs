//! # Configuration
//!
//! TOML input with every field optional, resolved into a validated
//! [`FuzzConfig`]. The CLI overlays its flags on the input before resolving,
//! so precedence is flags > file > defaults.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::layout::{
    TargetLayout, DEFAULT_BUFFER_SIZE, DEFAULT_CANARY, DEFAULT_FRAME_PADDING_BYTE,
    DEFAULT_FRAME_PADDING_LEN,
};
use crate::strategy::{Strategy, StrategySet, UnknownStrategy};

pub const CONFIG_VERSION: u32 = 1;

/// SecArch-8 listens on UDP 0x1984.
pub const DEFAULT_TARGET: &str = "127.0.0.1:6532";
pub const DEFAULT_COUNT: u64 = 500;
pub const DEFAULT_DELAY_MS: u64 = 100;
pub const DEFAULT_PROGRESS_EVERY: u64 = 50;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("buffer size must be greater than zero")]
    ZeroBufferSize,
    #[error("at least one strategy must be enabled")]
    NoStrategies,
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategy),
    #[error("invalid target address `{value}`: {source}")]
    InvalidTarget {
        value: String,
        #[source]
        source: std::io::Error,
    },
    #[error("target `{0}` did not resolve to any address")]
    UnresolvedTarget(String),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

// ── Input (raw, all optional) ───────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FuzzConfigInput {
    pub version: Option<u32>,
    pub target: Option<String>,
    pub strategies: Option<Vec<Strategy>>,
    pub layout: LayoutConfigInput,
    pub run: RunConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LayoutConfigInput {
    pub buffer_size: Option<usize>,
    pub canary: Option<u32>,
    pub frame_padding_byte: Option<u8>,
    pub frame_padding_len: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfigInput {
    pub count: Option<u64>,
    pub delay_ms: Option<u64>,
    pub progress_every: Option<u64>,
    pub seed: Option<u64>,
}

// ── Resolved ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub count: u64,
    pub delay: Duration,
    /// Log a progress line every N iterations; 0 disables.
    pub progress_every: u64,
    /// Fixed RNG seed; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            progress_every: DEFAULT_PROGRESS_EVERY,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuzzConfig {
    pub version: u32,
    pub target: SocketAddr,
    pub layout: TargetLayout,
    pub strategies: StrategySet,
    pub run: RunConfig,
}

impl FuzzConfigInput {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(FuzzConfigInput::default());
        }
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn resolve(self) -> Result<FuzzConfig, ConfigError> {
        let version = self.version.unwrap_or(CONFIG_VERSION);
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let target = resolve_target(self.target.as_deref().unwrap_or(DEFAULT_TARGET))?;

        let layout = TargetLayout::with_filler(
            self.layout.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            self.layout.canary.unwrap_or(DEFAULT_CANARY),
            self.layout
                .frame_padding_byte
                .unwrap_or(DEFAULT_FRAME_PADDING_BYTE),
            self.layout
                .frame_padding_len
                .unwrap_or(DEFAULT_FRAME_PADDING_LEN),
        )?;

        let strategies = match self.strategies {
            Some(list) => StrategySet::new(list)?,
            None => StrategySet::all(),
        };

        let defaults = RunConfig::default();
        let run = RunConfig {
            count: self.run.count.unwrap_or(defaults.count),
            delay: self
                .run
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.delay),
            progress_every: self.run.progress_every.unwrap_or(defaults.progress_every),
            seed: self.run.seed,
        };

        Ok(FuzzConfig {
            version,
            target,
            layout,
            strategies,
            run,
        })
    }
}

impl FuzzConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        FuzzConfigInput::from_toml_str(input)?.resolve()
    }
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            target: SocketAddr::from(([127, 0, 0, 1], 6532)),
            layout: TargetLayout::default(),
            strategies: StrategySet::all(),
            run: RunConfig::default(),
        }
    }
}

/// Accepts `ip:port` literals as well as `host:port` names.
fn resolve_target(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .to_socket_addrs()
        .map_err(|source| ConfigError::InvalidTarget {
            value: value.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ConfigError::UnresolvedTarget(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = FuzzConfig::from_toml_str("").unwrap();
        let defaults = FuzzConfig::default();
        assert_eq!(cfg.version, CONFIG_VERSION);
        assert_eq!(cfg.target, defaults.target);
        assert_eq!(cfg.layout, defaults.layout);
        assert_eq!(cfg.strategies, defaults.strategies);
        assert_eq!(cfg.run, defaults.run);
    }

    #[test]
    fn defaults_match_listener() {
        let cfg = FuzzConfig::default();
        assert_eq!(cfg.target.port(), 6532);
        assert_eq!(cfg.layout.buffer_size(), 64);
        assert_eq!(cfg.layout.canary_value(), 0xCAFE_BABE);
        assert_eq!(cfg.layout.frame_padding(), &[0x46; 8]);
        assert_eq!(cfg.run.count, 500);
        assert_eq!(cfg.run.delay, Duration::from_millis(100));
    }

    #[test]
    fn parse_toml_config_full() {
        let toml = r#"
            version = 1
            target = "10.0.0.5:7000"
            strategies = ["deep-overflow", "opcode-salad"]

            [layout]
            buffer_size = 128
            canary = 0xDEADBEEF
            frame_padding_byte = 0x42
            frame_padding_len = 16

            [run]
            count = 42
            delay_ms = 0
            progress_every = 10
            seed = 7
        "#;

        let cfg = FuzzConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.target, "10.0.0.5:7000".parse().unwrap());
        assert_eq!(
            cfg.strategies.strategies(),
            &[Strategy::DeepOverflow, Strategy::OpcodeSalad]
        );
        assert_eq!(cfg.layout.buffer_size(), 128);
        assert_eq!(cfg.layout.canary_value(), 0xDEAD_BEEF);
        assert_eq!(cfg.layout.frame_padding(), &[0x42; 16]);
        assert_eq!(cfg.run.count, 42);
        assert_eq!(cfg.run.delay, Duration::ZERO);
        assert_eq!(cfg.run.progress_every, 10);
        assert_eq!(cfg.run.seed, Some(7));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let err = FuzzConfig::from_toml_str("[layout]\nbuffer_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroBufferSize));
    }

    #[test]
    fn empty_strategy_list_is_rejected() {
        let err = FuzzConfig::from_toml_str("strategies = []").unwrap_err();
        assert!(matches!(err, ConfigError::NoStrategies));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = FuzzConfig::from_toml_str(r#"strategies = ["nop-sled"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn negative_buffer_is_rejected() {
        let err = FuzzConfig::from_toml_str("[layout]\nbuffer_size = -1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn explicit_zero_version_is_rejected() {
        let err = FuzzConfig::from_toml_str("version = 0").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion(0)));
    }

    #[test]
    fn strategy_names_parse_like_the_cli() {
        let cfg =
            FuzzConfig::from_toml_str(r#"strategies = ["Deep_Overflow", " opcode-salad "]"#)
                .unwrap();
        assert_eq!(
            cfg.strategies.strategies(),
            &[Strategy::DeepOverflow, Strategy::OpcodeSalad]
        );
    }

    #[test]
    fn unsupported_version() {
        let err = FuzzConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion(2)));
    }

    #[test]
    fn bad_target_is_rejected() {
        let mut input = FuzzConfigInput::default();
        input.target = Some("not an address".into());
        assert!(input.resolve().is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = FuzzConfigInput::load(Path::new("/nonexistent/secarch.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/secarch.toml"));
    }
}
