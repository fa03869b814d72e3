use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{DutyError, DutyResult};

/// Race a store or calendar call against the caller's cancellation token.
pub(crate) async fn cancellable<T>(
    token: &CancellationToken,
    operation: impl Future<Output = DutyResult<T>>,
) -> DutyResult<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(DutyError::Cancelled),
        result = operation => result,
    }
}
