//! Outbound adapters implementing the driven ports.
//!
//! Adapters translate between domain types and infrastructure; they hold no
//! business rules.

pub mod persistence;
