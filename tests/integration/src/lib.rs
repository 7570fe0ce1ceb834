//! Cross-crate scenario tests (spec §8 "Testable properties") that exercise
//! real HSM-backed crypto, a durable sqlite store, and real in-process gRPC
//! servers together — the seams unit tests inside each crate can't reach.

pub mod fixtures;

#[cfg(test)]
mod spm_scenarios;
#[cfg(test)]
mod pb_restart_and_sync;
#[cfg(test)]
mod pa_session_gateway;
