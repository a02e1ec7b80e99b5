//! Adapters implementing the payment service port.

pub mod http;
pub mod in_memory;
