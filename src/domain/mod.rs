//! Domain types for the point-of-sale payment flow and the port to the
//! payment service.

pub mod amount;
pub mod payment;
pub mod ports;
pub mod status;
