//! # secarch-fuzz
//!
//! Canary-aware blind UDP fuzzer for the SecArch-8 network listener.
//!
//! Random payloads are produced by a small set of strategies, rewritten so
//! that any overflow past the receive buffer carries the expected stack
//! canary and frame padding, and fired at the target one datagram at a time.
//!
//! ## Crate structure
//!
//! - [`source`] — Injected random byte generator
//! - [`strategy`] — Payload generation strategies and the enabled set
//! - [`layout`] — Target stack layout and the canary bypass rewrite
//! - [`transport`] — Datagram transport trait and UDP implementation
//! - [`stats`] — Per-run counters
//! - [`driver`] — Fuzz loop state machine
//! - [`config`] — TOML configuration and validation

pub mod config;
pub mod driver;
pub mod layout;
pub mod source;
pub mod stats;
pub mod strategy;
pub mod transport;
