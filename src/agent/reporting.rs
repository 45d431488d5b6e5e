//! Best-effort error reporting for failed turns.

use async_trait::async_trait;
use tracing::error;

use crate::error::KestrelError;
use crate::types::ChatTurn;

/// Receives errors a turn swallows into an `Error` event.
///
/// Reporting is best effort: a reporter failure never changes what the turn
/// yields.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(
        &self,
        err: &KestrelError,
        message: &str,
        context: &[ChatTurn],
        location: &str,
    ) -> Result<(), KestrelError>;
}

/// Default reporter: one `error!` event per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

#[async_trait]
impl ErrorReporter for TracingErrorReporter {
    async fn report(
        &self,
        err: &KestrelError,
        message: &str,
        context: &[ChatTurn],
        location: &str,
    ) -> Result<(), KestrelError> {
        error!(
            error = %err,
            category = ?err.category(),
            status = ?err.status(),
            context_turns = context.len(),
            location,
            "{message}"
        );
        Ok(())
    }
}
