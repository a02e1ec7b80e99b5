//! Application layer orchestrating a payment attempt.
//!
//! `PaymentFlowController` is the entry point used by the presentation layer.
//! Each monitoring session runs as its own `tokio` task and reports back over
//! channels, so no state is shared between payment attempts.

pub mod controller;
pub mod events;
pub mod monitor;
pub mod session;
