//! Collector library modules.
//!
//! Domain types, rules and state containers live in [`domain`]; adapters to
//! the hosted backend and the in-process backend live in [`outbound`]; the
//! command-line front end lives in [`inbound`]. [`app::Collector`] wires the
//! containers together.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

pub mod app;
pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use app::{Collector, Ports};
pub use config::CollectorSettings;
