//! Inbound adapters translating user input into container operations.
//!
//! The command-line front end is the only adapter: it parses commands with
//! clap, calls the containers in [`crate::app::Collector`] and renders the
//! resulting snapshots as text.

pub mod cli;
