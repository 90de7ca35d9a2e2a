//! Per-invocation execution context handed to the wrapped handler.

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation signal of a single invocation.
///
/// Cancellation is advisory: nothing in the adapter interrupts a handler.
/// Handlers poll [`InvocationContext::is_cancelled`] or await the token and
/// stop early on their own.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    request_id: String,
    deadline: Option<DateTime<Utc>>,
    cancellation: CancellationToken,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// A context with no request id, no deadline, and that is never
    /// cancelled unless someone calls [`cancel`](Self::cancel).
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Time left until the deadline, clamped at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Utc::now())
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled_at(Utc::now())
    }

    /// True once the token fired or the deadline passed.
    pub fn is_cancelled_at(&self, now: DateTime<Utc>) -> bool {
        self.cancellation.is_cancelled() || self.deadline.is_some_and(|d| now >= d)
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}
