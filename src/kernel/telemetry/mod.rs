//! Producer rate telemetry.
//!
//! Rates are derived, non-authoritative counters. Nothing in the signal path
//! reads them back; they exist for the status surface only.

pub mod metrics;
