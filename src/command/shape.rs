use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::driver::DriverError;
use crate::error::SqlMiddlewareDbError;

/// How the caller entered the executor.
///
/// The blocking shape calls the driver's blocking methods and never suspends,
/// so the shared async core completes on its first poll.
#[derive(Debug, Clone, Copy)]
pub enum CallShape<'t> {
    Blocking,
    Async(&'t CancellationToken),
}

impl CallShape<'_> {
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, CallShape::Async(_))
    }
}

/// Await a native call unless the token fires first.
///
/// A token that is already cancelled stops the call before it starts. Once
/// started, the call is polled ahead of the token, so a call that completes in
/// the same poll as the cancellation keeps its result.
pub(crate) async fn cancellable<T>(
    token: &CancellationToken,
    call: impl Future<Output = Result<T, DriverError>>,
) -> Result<T, SqlMiddlewareDbError> {
    if token.is_cancelled() {
        return Err(SqlMiddlewareDbError::Cancelled);
    }
    tokio::select! {
        biased;
        result = call => result.map_err(SqlMiddlewareDbError::from),
        () = token.cancelled() => Err(SqlMiddlewareDbError::Cancelled),
    }
}

/// Run one native call in the given shape.
macro_rules! native_call {
    ($shape:expr, $blocking:expr, $async_call:expr) => {
        match $shape {
            $crate::command::shape::CallShape::Blocking => {
                $blocking.map_err($crate::error::SqlMiddlewareDbError::from)
            }
            $crate::command::shape::CallShape::Async(token) => {
                $crate::command::shape::cancellable(token, $async_call).await
            }
        }
    };
}

pub(crate) use native_call;
