use std::time::Instant;

use tokio_util::sync::CancellationToken;

/// Per-request context threaded through every operation that can suspend.
/// Cancelling the token aborts the operation at its next suspension point.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub start_at: Instant,
    pub cancellation_token: CancellationToken,
}

impl OpContext {
    pub fn background() -> Self {
        Self {
            start_at: Instant::now(),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_token(cancellation_token: CancellationToken) -> Self {
        Self {
            start_at: Instant::now(),
            cancellation_token,
        }
    }

    pub fn is_cancelled(&self) -> bool { self.cancellation_token.is_cancelled() }
}

impl Default for OpContext {
    fn default() -> Self { Self::background() }
}
