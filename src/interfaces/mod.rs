//! Presentation-side adapters: QR source selection and terminal rendering.

pub mod console;
pub mod qr;
