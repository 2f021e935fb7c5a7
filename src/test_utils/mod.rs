//! In-memory driver and listeners for exercising the executor without an engine.
//!
//! `ScriptedConnection` hands out commands that replay a queue of
//! [`ScriptedOutcome`]s and count every open, close, dispose and parameter
//! clear in shared [`DriverCounters`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::diagnostics::{CommandEvent, DiagnosticsListener};
use crate::driver::{CommandSpec, DbCommand, DbConnection, DbCursor, DriverError, NativeValue};
use crate::params::BoundParameter;

/// What the next native execution does.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    Rows(i64),
    Scalar(NativeValue),
    Cursor {
        columns: Vec<String>,
        rows: Vec<Vec<NativeValue>>,
    },
    /// Yields its rows, then an async read never completes
    StalledCursor {
        columns: Vec<String>,
        rows: Vec<Vec<NativeValue>>,
    },
    Fail(DriverError),
    /// Never completes when awaited; fails when called blocking
    Pending,
}

impl ScriptedOutcome {
    #[must_use]
    pub fn cursor(columns: &[&str], rows: Vec<Vec<NativeValue>>) -> Self {
        ScriptedOutcome::Cursor {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }

    #[must_use]
    pub fn stalled_cursor(columns: &[&str], rows: Vec<Vec<NativeValue>>) -> Self {
        ScriptedOutcome::StalledCursor {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }

    #[must_use]
    pub fn fail(code: i32, message: &str) -> Self {
        ScriptedOutcome::Fail(DriverError::with_code(code, message))
    }
}

#[derive(Debug, Default)]
pub struct DriverCounters {
    opens: AtomicUsize,
    closes: AtomicUsize,
    commands_created: AtomicUsize,
    commands_disposed: AtomicUsize,
    parameters_cleared: AtomicUsize,
    executions: AtomicUsize,
}

impl DriverCounters {
    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn commands_created(&self) -> usize {
        self.commands_created.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn commands_disposed(&self) -> usize {
        self.commands_disposed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn parameters_cleared(&self) -> usize {
        self.parameters_cleared.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// A command as the driver received it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCommand {
    pub spec: CommandSpec,
    pub parameters: Vec<BoundParameter>,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    executed: Mutex<Vec<ExecutedCommand>>,
    counters: Arc<DriverCounters>,
}

impl Shared {
    fn next_outcome(&self) -> ScriptedOutcome {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| ScriptedOutcome::Fail(DriverError::new("no scripted outcome left")))
    }
}

#[derive(Debug)]
pub struct ScriptedConnection {
    id: Uuid,
    open: bool,
    transaction: Option<Uuid>,
    open_failure: Option<DriverError>,
    shared: Arc<Shared>,
}

impl Default for ScriptedConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConnection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            open: false,
            transaction: None,
            open_failure: None,
            shared: Arc::new(Shared::default()),
        }
    }

    #[must_use]
    pub fn with_outcomes(outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        let conn = Self::new();
        conn.push_outcomes(outcomes);
        conn
    }

    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) {
        self.shared
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(outcomes);
    }

    /// Open the connection inside an ambient transaction, as a caller would.
    pub fn begin_transaction(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.open = true;
        self.transaction = Some(id);
        id
    }

    #[must_use]
    pub fn failing_open(mut self, error: DriverError) -> Self {
        self.open_failure = Some(error);
        self
    }

    #[must_use]
    pub fn counters(&self) -> Arc<DriverCounters> {
        Arc::clone(&self.shared.counters)
    }

    #[must_use]
    pub fn executed_commands(&self) -> Vec<ExecutedCommand> {
        self.shared
            .executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DbConnection for ScriptedConnection {
    type Command = ScriptedCommand;

    fn connection_id(&self) -> Uuid {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) -> Result<(), DriverError> {
        DriverCounters::bump(&self.shared.counters.opens);
        if let Some(error) = &self.open_failure {
            return Err(error.clone());
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        DriverCounters::bump(&self.shared.counters.closes);
        self.open = false;
        Ok(())
    }

    fn current_transaction(&self) -> Option<Uuid> {
        self.transaction
    }

    fn create_command(&mut self, spec: &CommandSpec) -> Result<ScriptedCommand, DriverError> {
        if !self.open {
            return Err(DriverError::new("connection is closed"));
        }
        DriverCounters::bump(&self.shared.counters.commands_created);
        Ok(ScriptedCommand {
            spec: spec.clone(),
            parameters: Vec::new(),
            shared: Arc::clone(&self.shared),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedCommand {
    spec: CommandSpec,
    parameters: Vec<BoundParameter>,
    shared: Arc<Shared>,
}

impl ScriptedCommand {
    fn take_outcome(&mut self) -> ScriptedOutcome {
        DriverCounters::bump(&self.shared.counters.executions);
        self.shared
            .executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ExecutedCommand {
                spec: self.spec.clone(),
                parameters: self.parameters.clone(),
            });
        self.shared.next_outcome()
    }

    fn rows(outcome: ScriptedOutcome) -> Result<i64, DriverError> {
        match outcome {
            ScriptedOutcome::Rows(rows) => Ok(rows),
            other => Self::mismatch(other, "row count"),
        }
    }

    fn scalar(outcome: ScriptedOutcome) -> Result<NativeValue, DriverError> {
        match outcome {
            ScriptedOutcome::Scalar(value) => Ok(value),
            ScriptedOutcome::Cursor { rows, .. } => Ok(rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .unwrap_or(NativeValue::Null)),
            other => Self::mismatch(other, "scalar"),
        }
    }

    fn cursor(outcome: ScriptedOutcome) -> Result<MemoryCursor, DriverError> {
        match outcome {
            ScriptedOutcome::Cursor { columns, rows } => Ok(MemoryCursor::new(columns, rows)),
            ScriptedOutcome::StalledCursor { columns, rows } => {
                Ok(MemoryCursor::new(columns, rows).stalling_when_drained())
            }
            other => Self::mismatch(other, "cursor"),
        }
    }

    fn mismatch<T>(outcome: ScriptedOutcome, wanted: &str) -> Result<T, DriverError> {
        match outcome {
            ScriptedOutcome::Fail(error) => Err(error),
            ScriptedOutcome::Pending => Err(DriverError::new("pending outcome in a blocking call")),
            other => Err(DriverError::new(format!(
                "scripted {other:?} where a {wanted} was expected"
            ))),
        }
    }
}

impl Drop for ScriptedCommand {
    fn drop(&mut self) {
        DriverCounters::bump(&self.shared.counters.commands_disposed);
    }
}

#[async_trait]
impl DbCommand for ScriptedCommand {
    type Cursor = MemoryCursor;

    fn add_parameter(&mut self, parameter: BoundParameter) {
        self.parameters.push(parameter);
    }

    fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    fn clear_parameters(&mut self) {
        DriverCounters::bump(&self.shared.counters.parameters_cleared);
        self.parameters.clear();
    }

    fn execute_non_query(&mut self) -> Result<i64, DriverError> {
        let outcome = self.take_outcome();
        Self::rows(outcome)
    }

    async fn execute_non_query_async(&mut self) -> Result<i64, DriverError> {
        match self.take_outcome() {
            ScriptedOutcome::Pending => std::future::pending().await,
            outcome => Self::rows(outcome),
        }
    }

    fn execute_scalar(&mut self) -> Result<NativeValue, DriverError> {
        let outcome = self.take_outcome();
        Self::scalar(outcome)
    }

    async fn execute_scalar_async(&mut self) -> Result<NativeValue, DriverError> {
        match self.take_outcome() {
            ScriptedOutcome::Pending => std::future::pending().await,
            outcome => Self::scalar(outcome),
        }
    }

    fn execute_reader(&mut self) -> Result<MemoryCursor, DriverError> {
        let outcome = self.take_outcome();
        Self::cursor(outcome)
    }

    async fn execute_reader_async(&mut self) -> Result<MemoryCursor, DriverError> {
        match self.take_outcome() {
            ScriptedOutcome::Pending => std::future::pending().await,
            outcome => Self::cursor(outcome),
        }
    }
}

/// Forward-only cursor over rows held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCursor {
    columns: Vec<String>,
    rows: Vec<Vec<NativeValue>>,
    position: Option<usize>,
    stall_when_drained: bool,
}

impl MemoryCursor {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<NativeValue>>) -> Self {
        Self {
            columns,
            rows,
            position: None,
            stall_when_drained: false,
        }
    }

    /// Make the async read past the last row hang, like a slow fetch.
    #[must_use]
    pub fn stalling_when_drained(mut self) -> Self {
        self.stall_when_drained = true;
        self
    }

    fn current(&self) -> Result<&[NativeValue], DriverError> {
        self.position
            .and_then(|p| self.rows.get(p))
            .map(Vec::as_slice)
            .ok_or_else(|| DriverError::new("no current row"))
    }
}

#[async_trait]
impl DbCursor for MemoryCursor {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn records_affected(&self) -> i64 {
        -1
    }

    fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    fn get_name(&self, ordinal: usize) -> Result<String, DriverError> {
        self.columns
            .get(ordinal)
            .cloned()
            .ok_or_else(|| DriverError::new(format!("no column {ordinal}")))
    }

    fn get_ordinal(&self, name: &str) -> Result<usize, DriverError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| DriverError::new(format!("no column named {name}")))
    }

    fn get_data_type_name(&self, ordinal: usize) -> Result<String, DriverError> {
        Ok(self.get_value(ordinal)?.variant_name().to_string())
    }

    fn get_value(&self, ordinal: usize) -> Result<NativeValue, DriverError> {
        self.current()?
            .get(ordinal)
            .cloned()
            .ok_or_else(|| DriverError::new(format!("no column {ordinal}")))
    }

    fn read(&mut self) -> Result<bool, DriverError> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    async fn read_async(&mut self) -> Result<bool, DriverError> {
        if self.stall_when_drained && self.position.map_or(0, |p| p + 1) >= self.rows.len() {
            std::future::pending::<()>().await;
        }
        self.read()
    }

    fn next_result(&mut self) -> Result<bool, DriverError> {
        Ok(false)
    }
}

/// Keeps every event it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<CommandEvent>>,
}

impl RecordingDiagnostics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn events(&self) -> Vec<CommandEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Event names in arrival order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(CommandEvent::name).collect()
    }

    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }
}

impl DiagnosticsListener for RecordingDiagnostics {
    fn on_event(&self, event: &CommandEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
