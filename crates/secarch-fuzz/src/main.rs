//! SecArch-8 Canary-Aware Fuzzer
//!
//! Sends randomized, canary-preserving overflow payloads to the SecArch-8
//! UDP listener.
//!
//! ## Usage
//!
//! ```bash
//! # 500 packets at the local listener (0x1984)
//! secarch-fuzz
//!
//! # Longer run, overflow-only, reproducible
//! secarch-fuzz --count 5000 --strategy deep-overflow --seed 1337
//!
//! # Layout from a file, JSON summary on stdout
//! secarch-fuzz --config secarch.toml --json
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use secarch_fuzz::config::FuzzConfigInput;
use secarch_fuzz::driver::{FuzzDriver, RunOptions};
use secarch_fuzz::source::ByteSource;
use secarch_fuzz::strategy::Strategy;
use secarch_fuzz::transport::UdpTransport;

/// Canary-aware UDP fuzzer.
#[derive(Parser, Debug)]
#[command(name = "secarch-fuzz", about = "SecArch-8 canary-aware fuzzer")]
struct Cli {
    /// Number of packets to send [default: 500].
    #[arg(long)]
    count: Option<u64>,

    /// TOML configuration file. Flags take precedence over its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target address [default: 127.0.0.1:6532].
    #[arg(long)]
    target: Option<String>,

    /// Bytes before the canary slot [default: 64].
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Expected canary value, decimal or 0x-prefixed hex [default: 0xCAFEBABE].
    #[arg(long, value_parser = parse_u32)]
    canary: Option<u32>,

    /// Filler byte for the saved frame pointer slot [default: 0x46].
    #[arg(long, value_parser = parse_u8)]
    frame_padding_byte: Option<u8>,

    /// Width of the saved frame pointer slot [default: 8].
    #[arg(long)]
    frame_padding_len: Option<usize>,

    /// Delay between packets in milliseconds [default: 100].
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Log progress every N packets, 0 to disable [default: 50].
    #[arg(long)]
    progress_every: Option<u64>,

    /// Restrict generation to these strategies (repeatable).
    #[arg(long = "strategy")]
    strategies: Vec<Strategy>,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final summary as JSON on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Cli {
    /// Overlay explicitly passed flags onto the file configuration.
    fn apply(&self, input: &mut FuzzConfigInput) {
        if let Some(target) = &self.target {
            input.target = Some(target.clone());
        }
        if !self.strategies.is_empty() {
            input.strategies = Some(self.strategies.clone());
        }

        let layout = &mut input.layout;
        layout.buffer_size = self.buffer_size.or(layout.buffer_size);
        layout.canary = self.canary.or(layout.canary);
        layout.frame_padding_byte = self.frame_padding_byte.or(layout.frame_padding_byte);
        layout.frame_padding_len = self.frame_padding_len.or(layout.frame_padding_len);

        let run = &mut input.run;
        run.count = self.count.or(run.count);
        run.delay_ms = self.delay_ms.or(run.delay_ms);
        run.progress_every = self.progress_every.or(run.progress_every);
        run.seed = self.seed.or(run.seed);
    }
}

fn parse_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    }
}

fn parse_u8(s: &str) -> Result<u8, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .compact()
        .init();

    // ── Configuration ───────────────────────────────────────────
    let cli = Cli::parse();
    let mut input = match &cli.config {
        Some(path) => FuzzConfigInput::load(path)?,
        None => FuzzConfigInput::default(),
    };
    cli.apply(&mut input);
    let config = input.resolve().context("invalid configuration")?;

    let (source, seed) = match config.run.seed {
        Some(seed) => (ByteSource::seeded(seed), seed),
        None => ByteSource::from_entropy(),
    };

    tracing::info!(
        target_addr = %config.target,
        buffer_size = config.layout.buffer_size(),
        canary = %format!("{:#010X}", config.layout.canary_value()),
        frame_padding = config.layout.frame_padding().len(),
        seed,
        "secarch-fuzz starting"
    );

    let transport = UdpTransport::bind_for(config.target)
        .with_context(|| format!("failed to bind UDP socket for {}", config.target))?;

    // ── Graceful shutdown ───────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            tracing::info!("fuzzing paused by user");
            running.store(false, Ordering::Relaxed);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    // ── Fuzz loop ───────────────────────────────────────────────
    let mut driver = FuzzDriver::new(
        transport,
        source,
        config.strategies,
        config.layout,
        RunOptions {
            target: config.target,
            delay: config.run.delay,
            progress_every: config.run.progress_every,
        },
    );
    let summary = driver.run(config.run.count, &running)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    tracing::info!(
        seed,
        "if the target stopped responding, the overflow likely reached the return address"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_decimal_canary() {
        assert_eq!(parse_u32("0xCAFEBABE").unwrap(), 0xCAFE_BABE);
        assert_eq!(parse_u32("0xcafe_babe").unwrap(), 0xCAFE_BABE);
        assert_eq!(parse_u32("3405691582").unwrap(), 0xCAFE_BABE);
        assert!(parse_u32("0x1_0000_0000").is_err());
        assert_eq!(parse_u8("0x46").unwrap(), b'F');
        assert!(parse_u8("256").is_err());
    }

    #[test]
    fn flags_override_file() {
        let mut input = FuzzConfigInput::from_toml_str(
            r#"
            target = "10.0.0.1:9000"
            [layout]
            buffer_size = 32
            [run]
            count = 10
            delay_ms = 5
            "#,
        )
        .unwrap();
        let cli = Cli::parse_from([
            "secarch-fuzz",
            "--count",
            "3",
            "--buffer-size",
            "128",
            "--strategy",
            "deep-overflow",
        ]);
        cli.apply(&mut input);
        let cfg = input.resolve().unwrap();

        assert_eq!(cfg.target.port(), 9000);
        assert_eq!(cfg.layout.buffer_size(), 128);
        assert_eq!(cfg.run.count, 3);
        assert_eq!(cfg.run.delay.as_millis(), 5);
        assert_eq!(cfg.strategies.strategies(), &[Strategy::DeepOverflow]);
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
