//! Bounded retry for destructive administrative statements.
//!
//! Dropping a user fails while pooled sessions still hold it. Each attempt
//! first clears the connection pools, then runs the statement; "resource busy"
//! failures are retried after a delay until the attempt or time budget runs out.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::{CommandExecutor, RelationalCommand};
use crate::config::TeardownOptions;
use crate::driver::DbConnection;
use crate::error::SqlMiddlewareDbError;
use crate::params::ParameterValues;

/// Engine codes meaning "still in use, try again shortly".
///
/// ORA-01940 cannot drop a user that is currently connected,
/// ORA-00031 session marked for kill, ORA-00030 user session ID does not exist,
/// ORA-00026 missing or invalid session ID.
pub const BUSY_CODES: [i32; 4] = [1940, 31, 30, 26];

/// Anything that can drop idle pooled connections before a teardown attempt.
///
/// Implemented for `deadpool` pools, which drop every idle object, and for any
/// `Fn(&str)` closure, which receives the resource name.
pub trait PoolControl {
    /// Drop pooled connections that could hold `resource`.
    fn clear_pools(&self, resource: &str);
}

impl<M: deadpool::managed::Manager> PoolControl for deadpool::managed::Pool<M> {
    fn clear_pools(&self, _resource: &str) {
        let _ = self.retain(|_, _| false);
    }
}

impl<F: Fn(&str)> PoolControl for F {
    fn clear_pools(&self, resource: &str) {
        self(resource);
    }
}

/// Whether `error` is one of the transient "resource busy" failures.
///
/// # Arguments
///
/// * `error` - any crate error; command and driver wrappers are looked through
///
/// # Returns
///
/// `true` when its engine code is one of [`BUSY_CODES`].
#[must_use]
pub fn is_resource_busy(error: &SqlMiddlewareDbError) -> bool {
    error.native_code().is_some_and(|code| BUSY_CODES.contains(&code))
}

fn as_busy(error: &SqlMiddlewareDbError) -> Option<SqlMiddlewareDbError> {
    let code = error.native_code().filter(|code| BUSY_CODES.contains(code))?;
    let message = match error {
        SqlMiddlewareDbError::TransientResourceBusy { message, .. } => message.clone(),
        other => other
            .driver_error()
            .map_or_else(|| other.to_string(), |e| e.message.clone()),
    };
    Some(SqlMiddlewareDbError::TransientResourceBusy { code, message })
}

struct RetryBudget<'a> {
    options: &'a TeardownOptions,
    resource: &'a str,
    started: Instant,
    attempts: u32,
}

impl<'a> RetryBudget<'a> {
    fn start(options: &'a TeardownOptions, resource: &'a str) -> Self {
        Self {
            options,
            resource,
            started: Instant::now(),
            attempts: 0,
        }
    }

    fn succeeded(&self) {
        debug!(
            resource = self.resource,
            attempts = self.attempts + 1,
            "teardown complete"
        );
    }

    /// Delay before the next attempt, or the error that ends the teardown.
    fn after_failure(&mut self, error: SqlMiddlewareDbError) -> Result<Duration, SqlMiddlewareDbError> {
        self.attempts += 1;
        let Some(busy) = as_busy(&error) else {
            return Err(error);
        };

        let elapsed = self.started.elapsed();
        let delay = self.options.retry_delay;
        if self.attempts >= self.options.max_attempts
            || elapsed + delay > self.options.total_timeout
        {
            return Err(SqlMiddlewareDbError::TeardownTimedOut {
                resource: self.resource.to_string(),
                attempts: self.attempts,
                elapsed,
                last_error: Box::new(busy),
            });
        }

        warn!(
            resource = self.resource,
            attempt = self.attempts,
            code = ?error.native_code(),
            ?delay,
            "resource busy, retrying teardown"
        );
        Ok(delay)
    }
}

/// Retries teardown statements while the engine reports the resource busy.
#[derive(Debug, Clone, Default)]
pub struct TeardownProtocol {
    options: TeardownOptions,
}

impl TeardownProtocol {
    /// Create a protocol bounded by `options`.
    #[must_use]
    pub fn new(options: TeardownOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &TeardownOptions {
        &self.options
    }

    /// Run `attempt` until it succeeds, clearing `pool` before every try.
    ///
    /// # Arguments
    ///
    /// * `resource` - name used in logs and in `TeardownTimedOut`
    /// * `pool` - cleared before each attempt so no pooled session holds the resource
    /// * `attempt` - builds one try of the destructive statement
    /// * `cancel` - observed while waiting between attempts
    ///
    /// # Returns
    ///
    /// `Ok(())` once an attempt succeeds.
    ///
    /// # Errors
    /// Non-busy errors are returned unchanged from the attempt that raised them;
    /// running out of attempts or time yields `TeardownTimedOut`, and a fired
    /// `cancel` yields `Cancelled`.
    pub async fn drop_resource<P, F, Fut>(
        &self,
        resource: &str,
        pool: &P,
        mut attempt: F,
        cancel: &CancellationToken,
    ) -> Result<(), SqlMiddlewareDbError>
    where
        P: PoolControl + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), SqlMiddlewareDbError>>,
    {
        let mut budget = RetryBudget::start(&self.options, resource);
        loop {
            pool.clear_pools(resource);
            match attempt().await {
                Ok(()) => {
                    budget.succeeded();
                    return Ok(());
                }
                Err(error) => {
                    let delay = budget.after_failure(error)?;
                    pause(delay, cancel).await?;
                }
            }
        }
    }

    /// Blocking form of [`TeardownProtocol::drop_resource`]; sleeps the calling thread.
    ///
    /// # Returns
    ///
    /// `Ok(())` once an attempt succeeds.
    ///
    /// # Errors
    /// As [`TeardownProtocol::drop_resource`].
    pub fn drop_resource_blocking<P, F>(
        &self,
        resource: &str,
        pool: &P,
        mut attempt: F,
    ) -> Result<(), SqlMiddlewareDbError>
    where
        P: PoolControl + ?Sized,
        F: FnMut() -> Result<(), SqlMiddlewareDbError>,
    {
        let mut budget = RetryBudget::start(&self.options, resource);
        loop {
            pool.clear_pools(resource);
            match attempt() {
                Ok(()) => {
                    budget.succeeded();
                    return Ok(());
                }
                Err(error) => {
                    let delay = budget.after_failure(error)?;
                    std::thread::sleep(delay);
                }
            }
        }
    }

    /// Drop a database user and everything it owns.
    ///
    /// Issues `DROP USER "user" CASCADE` through `executor` on `connection`,
    /// clearing `pool` before every attempt.
    ///
    /// # Arguments
    ///
    /// * `executor` - runs each attempt and raises its diagnostics
    /// * `connection` - opened and closed per attempt unless the caller holds it open
    /// * `pool` - pools whose idle sessions may still be logged in as `user`
    /// * `user` - the user to drop; quotes in the name are doubled
    /// * `cancel` - observed at every native call and between attempts
    ///
    /// # Errors
    /// As [`TeardownProtocol::drop_resource`], plus `Cancelled` when `cancel` fires.
    pub async fn drop_user<C, P>(
        &self,
        executor: &CommandExecutor,
        connection: &mut C,
        pool: &P,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SqlMiddlewareDbError>
    where
        C: DbConnection,
        P: PoolControl + ?Sized,
    {
        let command = drop_user_command(user);
        let values = ParameterValues::new();
        let mut budget = RetryBudget::start(&self.options, user);
        loop {
            pool.clear_pools(user);
            match executor
                .execute_non_query_async(connection, &command, &values, cancel)
                .await
            {
                Ok(_) => {
                    budget.succeeded();
                    return Ok(());
                }
                Err(error) => {
                    let delay = budget.after_failure(error)?;
                    pause(delay, cancel).await?;
                }
            }
        }
    }

    /// Blocking form of [`TeardownProtocol::drop_user`].
    ///
    /// # Errors
    /// As [`TeardownProtocol::drop_resource`].
    pub fn drop_user_blocking<C, P>(
        &self,
        executor: &CommandExecutor,
        connection: &mut C,
        pool: &P,
        user: &str,
    ) -> Result<(), SqlMiddlewareDbError>
    where
        C: DbConnection,
        P: PoolControl + ?Sized,
    {
        let command = drop_user_command(user);
        let values = ParameterValues::new();
        self.drop_resource_blocking(user, pool, || {
            executor
                .execute_non_query(connection, &command, &values)
                .map(|_| ())
        })
    }
}

/// Sleep between attempts unless `cancel` fires first.
async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), SqlMiddlewareDbError> {
    tokio::select! {
        () = cancel.cancelled() => Err(SqlMiddlewareDbError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

fn drop_user_command(user: &str) -> RelationalCommand {
    RelationalCommand::new(format!(
        "DROP USER \"{}\" CASCADE",
        user.replace('"', "\"\"")
    ))
}
