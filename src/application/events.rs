use crate::domain::payment::PaymentRecord;
use crate::domain::status::Settlement;

/// Notifications sent from the payment flow to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// A creation request is in flight.
    Loading,
    /// A user-facing error message.
    Error(String),
    Created(PaymentRecord),
    Completed(Settlement),
    TimedOut,
}

/// Lifecycle of the controller's current payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    Creating,
    CreateFailed,
    Created,
    Monitoring,
    Completed,
    TimedOut,
    Cancelled,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CreateFailed | Self::Completed | Self::TimedOut | Self::Cancelled
        )
    }
}
