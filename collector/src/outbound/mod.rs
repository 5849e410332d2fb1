//! Outbound adapters implementing the domain ports.
//!
//! - **supabase**: GoTrue and PostgREST over HTTP.
//! - **memory**: process-local tables for offline use and tests.
//!
//! Adapters translate between domain types and wire or storage shapes; they
//! hold no business rules.

pub mod memory;
pub mod supabase;
