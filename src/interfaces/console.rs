use super::qr::QrSource;
use crate::application::events::FlowEvent;
use crate::domain::payment::PaymentRecord;
use crate::domain::status::Settlement;
use std::io::{self, Write};

/// Renders payment flow events as plain text lines.
pub struct ConsoleRenderer<W: Write> {
    out: W,
    qr_service_url: String,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W, qr_service_url: &str) -> Self {
        Self {
            out,
            qr_service_url: qr_service_url.to_string(),
        }
    }

    pub fn render(&mut self, event: &FlowEvent) -> io::Result<()> {
        match event {
            FlowEvent::Loading => writeln!(self.out, "Creating CryptoNow payment...")?,
            FlowEvent::Error(message) => writeln!(self.out, "⚠️ {message}")?,
            FlowEvent::Created(record) => self.render_created(record)?,
            FlowEvent::Completed(settlement) => self.render_completed(settlement)?,
            FlowEvent::TimedOut => writeln!(
                self.out,
                "⏰ Payment monitoring timed out - no settlement observed"
            )?,
        }
        self.out.flush()
    }

    fn render_created(&mut self, record: &PaymentRecord) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {}",
            record.amount.normalize(),
            record.token_symbol
        )?;
        writeln!(
            self.out,
            "+ {} {} CryptoNow fee",
            record.fee.amount.normalize(),
            record.fee.token_symbol
        )?;
        writeln!(self.out, "ID: {}", record.short_id())?;
        writeln!(self.out, "Payment URL: {}", record.payment_url)?;
        match QrSource::for_record(record, &self.qr_service_url) {
            Ok(source) => writeln!(self.out, "QR code: {source}"),
            Err(e) => writeln!(self.out, "⚠️ QR code unavailable: {e}"),
        }
    }

    fn render_completed(&mut self, settlement: &Settlement) -> io::Result<()> {
        writeln!(self.out, "✅ Payment Completed!")?;
        if let (Some(amount), Some(token)) = (settlement.amount, settlement.token.as_deref()) {
            writeln!(self.out, "{} {}", amount.normalize(), token)?;
        }
        let short_signature: String = settlement.signature.chars().take(8).collect();
        writeln!(self.out, "Signature: {short_signature}...")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
