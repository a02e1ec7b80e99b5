use crate::config::MonitorSettings;
use crate::domain::status::{PaymentStatus, Settlement};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

/// Acceptance state for one payment attempt.
///
/// Holds the attempt's creation time and the one-way `has_accepted` latch.
/// A session hands out at most one [`Settlement`] over its lifetime.
#[derive(Debug, Clone)]
pub struct PollingSession {
    payment_id: String,
    created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    grace_window: TimeDelta,
    attempt_count: u32,
    has_accepted: bool,
}

impl PollingSession {
    pub fn new(payment_id: &str, created_at: DateTime<Utc>, settings: &MonitorSettings) -> Self {
        let timeout = TimeDelta::from_std(settings.timeout).unwrap_or_else(|_| TimeDelta::weeks(52));
        let grace_window =
            TimeDelta::from_std(settings.grace_window).unwrap_or_else(|_| TimeDelta::weeks(52));
        Self {
            payment_id: payment_id.to_string(),
            created_at,
            deadline: created_at
                .checked_add_signed(timeout)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            grace_window,
            attempt_count: 0,
            has_accepted: false,
        }
    }

    pub fn payment_id(&self) -> &str {
        &self.payment_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn has_accepted(&self) -> bool {
        self.has_accepted
    }

    pub fn record_attempt(&mut self) {
        self.attempt_count = self.attempt_count.saturating_add(1);
    }

    /// Time left until the deadline, measured against `now`.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.deadline - now).to_std().unwrap_or_default()
    }

    /// Applies the acceptance rule to one status snapshot.
    ///
    /// Returns the settlement and sets the latch when the snapshot proves
    /// settlement and was verified no earlier than `created_at` minus the
    /// grace window. Snapshots verified before that belong to an older
    /// attempt and are ignored.
    pub fn evaluate(&mut self, status: &PaymentStatus) -> Option<Settlement> {
        if self.has_accepted {
            return None;
        }

        let (signature, verified_at) = status.settlement_proof()?;
        let earliest = self
            .created_at
            .checked_sub_signed(self.grace_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if verified_at < earliest {
            debug!(
                payment_id = %self.payment_id,
                %verified_at,
                %earliest,
                "ignoring completion verified before this attempt"
            );
            return None;
        }

        self.has_accepted = true;
        let mut settlement = status.clone().into_settlement(signature, verified_at);
        settlement.payment_id.clone_from(&self.payment_id);
        Some(settlement)
    }
}
