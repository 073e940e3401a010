//! # Tactics Test Utilities
//!
//! Shared helpers for tests across the tactics crates:
//!
//! - [`fixtures`] - Ready-made units, weapons and arenas
//! - [`determinism`] - Seed-replay harness and proptest strategies
//! - [`balance`] - Aggregate statistics over many skirmishes

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]

pub mod balance;
pub mod determinism;
pub mod fixtures;

pub use proptest;
