use std::sync::Arc;
use std::time::Duration;

use sql_middleware_oracle::prelude::*;
use sql_middleware_oracle::test_utils::{RecordingDiagnostics, ScriptedConnection, ScriptedOutcome};
use uuid::Uuid;

fn executor(diagnostics: &Arc<RecordingDiagnostics>) -> CommandExecutor {
    CommandExecutor::default().with_diagnostics(diagnostics.clone())
}

fn update_command() -> RelationalCommand {
    let catalog = TypeMappingCatalog::oracle();
    RelationalCommand::new("UPDATE USERS SET NAME = :name WHERE ID = :id;")
        .parameter("name", catalog.find_by_kind(LogicalKind::String).unwrap())
        .parameter("id", catalog.find_by_kind(LogicalKind::Integer(IntWidth::W32)).unwrap())
}

fn update_values() -> ParameterValues {
    ParameterValues::new()
        .with("name", RowValues::Text("alice".into()))
        .with("id", RowValues::Int(7))
}

fn users_cursor(guid: Uuid) -> ScriptedOutcome {
    ScriptedOutcome::cursor(
        &["ID", "ACTIVE", "TOKEN", "NAME"],
        vec![
            vec![
                NativeValue::Int(1),
                NativeValue::Int(1),
                NativeValue::Bytes(guid.as_bytes().to_vec()),
                NativeValue::Text("alice".into()),
            ],
            vec![
                NativeValue::Int(2),
                NativeValue::Int(0),
                NativeValue::Null,
                NativeValue::Text("bob".into()),
            ],
        ],
    )
}

fn is_async_flags(diagnostics: &RecordingDiagnostics) -> Vec<bool> {
    diagnostics
        .events()
        .iter()
        .filter_map(|event| match event {
            CommandEvent::CommandExecuting { is_async, .. }
            | CommandEvent::CommandExecuted { is_async, .. }
            | CommandEvent::CommandError { is_async, .. } => Some(*is_async),
            CommandEvent::DataReaderDisposing { .. } => None,
        })
        .collect()
}

#[test]
fn non_query_opens_and_closes_its_own_connection() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::Rows(1)]);
    let counters = conn.counters();

    let changed = executor(&diagnostics).execute_non_query(
        &mut conn,
        &update_command(),
        &update_values(),
    )?;

    assert_eq!(changed, 1);
    assert_eq!(diagnostics.names(), ["command_executing", "command_executed"]);
    assert_eq!(is_async_flags(&diagnostics), [false, false]);
    assert_eq!(counters.opens(), 1);
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.commands_created(), 1);
    assert_eq!(counters.commands_disposed(), 1);
    assert_eq!(counters.parameters_cleared(), 1);
    assert!(!conn.is_open());

    let executed = conn.executed_commands();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].spec.text,
        "UPDATE USERS SET NAME = :name WHERE ID = :id"
    );
    let names: Vec<_> = executed[0].parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["name", "id"]);
    assert_eq!(executed[0].parameters[0].size, Some(2000));
    Ok(())
}

#[tokio::test]
async fn async_non_query_reports_async_events() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::Rows(3)]);
    let counters = conn.counters();

    let changed = executor(&diagnostics)
        .execute_non_query_async(
            &mut conn,
            &update_command(),
            &update_values(),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(changed, 3);
    assert_eq!(diagnostics.names(), ["command_executing", "command_executed"]);
    assert_eq!(is_async_flags(&diagnostics), [true, true]);
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.parameters_cleared(), 1);
    Ok(())
}

#[test]
fn caller_opened_connection_stays_open() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::Rows(1)]);
    let transaction = conn.begin_transaction();
    let counters = conn.counters();

    executor(&diagnostics).execute_non_query(&mut conn, &update_command(), &update_values())?;

    assert_eq!(counters.opens(), 0);
    assert_eq!(counters.closes(), 0);
    assert!(conn.is_open());
    assert_eq!(conn.executed_commands()[0].spec.transaction_id, Some(transaction));
    match &diagnostics.events()[0] {
        CommandEvent::CommandExecuting { context, .. } => {
            assert_eq!(context.transaction_id, Some(transaction));
            assert_eq!(context.connection_id, conn.connection_id());
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn driver_failure_is_wrapped_with_context() {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn =
        ScriptedConnection::with_outcomes([ScriptedOutcome::fail(942, "table or view does not exist")]);
    let counters = conn.counters();

    let err = executor(&diagnostics)
        .execute_non_query(&mut conn, &update_command(), &update_values())
        .unwrap_err();

    assert_eq!(err.native_code(), Some(942));
    match &err {
        SqlMiddlewareDbError::CommandFailed(failure) => {
            assert_eq!(failure.command_text, "UPDATE USERS SET NAME = :name WHERE ID = :id");
            assert_eq!(failure.parameters, "name=?, id=?");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(diagnostics.names(), ["command_executing", "command_error"]);
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.commands_disposed(), 1);
    assert_eq!(counters.parameters_cleared(), 1);
}

#[test]
fn parameter_values_are_logged_only_when_enabled() {
    let diagnostics = RecordingDiagnostics::new();
    let options = ExecutorOptions::new().with_parameter_values_logged(true);
    let executor = CommandExecutor::new(options).with_diagnostics(diagnostics.clone());
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::fail(1, "unique constraint")]);

    let err = executor
        .execute_non_query(&mut conn, &update_command(), &update_values())
        .unwrap_err();
    match err {
        SqlMiddlewareDbError::CommandFailed(failure) => {
            assert!(failure.parameters.contains("alice"), "{}", failure.parameters);
            assert!(failure.parameters.contains("id=Int(7)"), "{}", failure.parameters);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn reader_failure_reports_one_error_and_releases_everything() {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn =
        ScriptedConnection::with_outcomes([ScriptedOutcome::fail(904, "invalid identifier")]);
    let counters = conn.counters();

    let err = executor(&diagnostics)
        .execute_reader(&mut conn, &RelationalCommand::new("SELECT NOPE FROM USERS"), &ParameterValues::new())
        .unwrap_err();

    assert_eq!(err.native_code(), Some(904));
    assert_eq!(diagnostics.count("command_error"), 1);
    assert_eq!(diagnostics.count("command_executed"), 0);
    assert_eq!(diagnostics.count("data_reader_disposing"), 0);
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.commands_disposed(), 1);
    assert_eq!(counters.parameters_cleared(), 1);
}

#[test]
fn binding_failure_touches_nothing() {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::Rows(1)]);
    let counters = conn.counters();
    let values = ParameterValues::new().with("name", RowValues::Text("alice".into()));

    let err = executor(&diagnostics)
        .execute_non_query(&mut conn, &update_command(), &values)
        .unwrap_err();

    assert!(matches!(err, SqlMiddlewareDbError::MissingParameterValue { ref name } if name == "id"));
    assert!(diagnostics.events().is_empty());
    assert_eq!(counters.opens(), 0);
    assert_eq!(counters.commands_created(), 0);
}

#[test]
fn open_failure_is_returned_unchanged() {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::new().failing_open(DriverError::with_code(12541, "no listener"));
    let counters = conn.counters();

    let err = executor(&diagnostics)
        .execute_non_query(&mut conn, &RelationalCommand::new("SELECT 1 FROM DUAL"), &ParameterValues::new())
        .unwrap_err();

    assert!(matches!(err, SqlMiddlewareDbError::Driver(_)));
    assert_eq!(err.native_code(), Some(12541));
    assert!(diagnostics.events().is_empty());
    assert_eq!(counters.closes(), 0);
}

#[test]
fn reader_owns_the_connection_until_closed() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let guid = Uuid::new_v4();
    let mut conn = ScriptedConnection::with_outcomes([users_cursor(guid)]);
    let counters = conn.counters();
    let catalog = TypeMappingCatalog::oracle();
    let flag = catalog.find_by_kind(LogicalKind::Boolean)?;
    let token = catalog.find_by_kind(LogicalKind::Guid)?;

    let mut reader = executor(&diagnostics).execute_reader(
        &mut conn,
        &RelationalCommand::new("SELECT ID, ACTIVE, TOKEN, NAME FROM USERS"),
        &ParameterValues::new(),
    )?;
    assert!(reader.closes_connection());
    assert_eq!(counters.closes(), 0);
    assert_eq!(counters.commands_disposed(), 0);
    assert_eq!(diagnostics.names(), ["command_executing", "command_executed"]);

    assert!(reader.read()?);
    assert_eq!(reader.read_value(1, &flag)?, RowValues::Bool(true));
    assert_eq!(reader.read_value(2, &token)?, RowValues::Guid(guid));
    assert!(reader.read()?);
    assert_eq!(reader.read_value(1, &flag)?, RowValues::Bool(false));
    assert_eq!(reader.read_value(2, &token)?, RowValues::Null);
    assert!(!reader.read()?);
    assert!(!reader.next_result()?);

    reader.close()?;
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.commands_disposed(), 1);
    assert_eq!(counters.parameters_cleared(), 1);
    assert_eq!(diagnostics.count("data_reader_disposing"), 1);
    Ok(())
}

#[test]
fn dropped_reader_releases_too() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([users_cursor(Uuid::new_v4())]);
    let counters = conn.counters();

    let reader = executor(&diagnostics).execute_reader(
        &mut conn,
        &RelationalCommand::new("SELECT * FROM USERS"),
        &ParameterValues::new(),
    )?;
    drop(reader);

    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.commands_disposed(), 1);
    assert_eq!(diagnostics.count("data_reader_disposing"), 1);
    Ok(())
}

#[test]
fn reader_leaves_caller_connection_open() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([users_cursor(Uuid::new_v4())]);
    conn.begin_transaction();
    let counters = conn.counters();

    let reader = executor(&diagnostics).execute_reader(
        &mut conn,
        &RelationalCommand::new("SELECT * FROM USERS"),
        &ParameterValues::new(),
    )?;
    assert!(!reader.closes_connection());
    reader.close()?;

    assert_eq!(counters.closes(), 0);
    assert_eq!(counters.commands_disposed(), 1);
    assert!(conn.is_open());
    Ok(())
}

#[tokio::test]
async fn reader_buffers_rows_by_name() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let guid = Uuid::new_v4();
    let mut conn = ScriptedConnection::with_outcomes([users_cursor(guid)]);
    let catalog = TypeMappingCatalog::oracle();
    let mappings = [
        catalog.find_by_kind(LogicalKind::Integer(IntWidth::W64))?,
        catalog.find_by_kind(LogicalKind::Boolean)?,
        catalog.find_by_kind(LogicalKind::Guid)?,
    ];

    let mut reader = executor(&diagnostics)
        .execute_reader_async(
            &mut conn,
            &RelationalCommand::new("SELECT ID, ACTIVE, TOKEN, NAME FROM USERS"),
            &ParameterValues::new(),
            &CancellationToken::new(),
        )
        .await?;
    let rows = reader.buffer_async(&mappings, &CancellationToken::new()).await?;
    reader.close()?;

    assert_eq!(rows.len(), 2);
    let first = &rows.results[0];
    assert_eq!(first.get("ACTIVE"), Some(&RowValues::Bool(true)));
    assert_eq!(first.get("token"), Some(&RowValues::Guid(guid)));
    // no mapping for NAME, decoded by shape
    assert_eq!(first.get("NAME"), Some(&RowValues::Text("alice".into())));
    assert_eq!(rows.results[1].get_by_index(1), Some(&RowValues::Bool(false)));
    assert_eq!(is_async_flags(&diagnostics), [true, true]);
    Ok(())
}

#[test]
fn scalar_is_decoded_through_the_result_mapping() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([
        ScriptedOutcome::Scalar(NativeValue::Int(1)),
        ScriptedOutcome::Scalar(NativeValue::Int(1)),
    ]);
    let flag = TypeMappingCatalog::oracle().find_by_kind(LogicalKind::Boolean)?;
    let executor = executor(&diagnostics);

    let typed = RelationalCommand::new("SELECT ACTIVE FROM USERS WHERE ID = 1").result_mapping(flag);
    assert_eq!(
        executor.execute_scalar(&mut conn, &typed, &ParameterValues::new())?,
        RowValues::Bool(true)
    );

    let untyped = RelationalCommand::new("SELECT ACTIVE FROM USERS WHERE ID = 1");
    assert_eq!(
        executor.execute_scalar(&mut conn, &untyped, &ParameterValues::new())?,
        RowValues::Int(1)
    );
    assert_eq!(diagnostics.count("command_executed"), 2);
    Ok(())
}

#[tokio::test]
async fn async_scalar_from_empty_result_is_null() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::cursor(&["N"], vec![])]);

    let value = executor(&diagnostics)
        .execute_scalar_async(
            &mut conn,
            &RelationalCommand::new("SELECT N FROM EMPTY_TABLE"),
            &ParameterValues::new(),
            &CancellationToken::new(),
        )
        .await?;
    assert_eq!(value, RowValues::Null);
    Ok(())
}

#[test]
fn plsql_blocks_keep_their_terminator() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::Rows(0)]);
    let options = ExecutorOptions::new().with_command_timeout(Some(Duration::from_secs(5)));
    let executor = CommandExecutor::new(options).with_diagnostics(diagnostics.clone());

    executor.execute_non_query(
        &mut conn,
        &RelationalCommand::new("  BEGIN NULL; END;  "),
        &ParameterValues::new(),
    )?;

    let spec = &conn.executed_commands()[0].spec;
    assert_eq!(spec.text, "BEGIN NULL; END;");
    assert_eq!(spec.timeout, Some(Duration::from_secs(5)));
    Ok(())
}

#[tokio::test]
async fn cancelled_token_stops_before_opening() {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::Rows(1)]);
    let counters = conn.counters();
    let token = CancellationToken::new();
    token.cancel();

    let err = executor(&diagnostics)
        .execute_non_query_async(&mut conn, &update_command(), &update_values(), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, SqlMiddlewareDbError::Cancelled));
    assert_eq!(counters.opens(), 0);
    assert_eq!(counters.commands_created(), 0);
    assert!(diagnostics.events().is_empty());
}

#[tokio::test]
async fn cancellation_during_execution_releases_resources() {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::Pending]);
    let counters = conn.counters();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = executor(&diagnostics)
        .execute_reader_async(
            &mut conn,
            &RelationalCommand::new("SELECT * FROM SLOW_VIEW"),
            &ParameterValues::new(),
            &token,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SqlMiddlewareDbError::Cancelled));
    assert_eq!(diagnostics.names(), ["command_executing", "command_error"]);
    assert_eq!(counters.executions(), 1);
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.commands_disposed(), 1);
    assert_eq!(counters.parameters_cleared(), 1);
}

fn command_ids(diagnostics: &RecordingDiagnostics) -> Vec<Uuid> {
    diagnostics.events().iter().map(CommandEvent::command_id).collect()
}

#[test]
fn events_of_one_execution_share_an_id() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([
        ScriptedOutcome::Rows(2),
        ScriptedOutcome::fail(942, "table or view does not exist"),
    ]);
    let executor = executor(&diagnostics);
    let before = chrono::Utc::now();

    executor.execute_non_query(&mut conn, &update_command(), &update_values())?;
    let err = executor
        .execute_non_query(&mut conn, &update_command(), &update_values())
        .unwrap_err();
    assert_eq!(err.native_code(), Some(942));

    let ids = command_ids(&diagnostics);
    assert_eq!(ids.len(), 4);
    assert_eq!(ids[0], ids[1]);
    assert_eq!(ids[2], ids[3]);
    assert_ne!(ids[0], ids[2]);

    let events = diagnostics.events();
    match &events[0] {
        CommandEvent::CommandExecuting { context, .. } => {
            assert!(context.start_time >= before);
            assert!(context.start_time <= chrono::Utc::now());
        }
        other => panic!("unexpected {other:?}"),
    }
    match &events[1] {
        CommandEvent::CommandExecuted { result, .. } => {
            assert_eq!(*result, CommandResult::RowsAffected(2));
        }
        other => panic!("unexpected {other:?}"),
    }
    match &events[3] {
        CommandEvent::CommandError { error, .. } => {
            assert_eq!(error.kind, ErrorKind::CommandFailed);
            assert_eq!(error.native_code, Some(942));
            assert!(error.message.contains("table or view does not exist"));
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn executed_events_carry_the_result() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([
        ScriptedOutcome::Scalar(NativeValue::Int(1)),
        users_cursor(Uuid::new_v4()),
    ]);
    let flag = TypeMappingCatalog::oracle().find_by_kind(LogicalKind::Boolean)?;
    let executor = executor(&diagnostics);

    executor.execute_scalar(
        &mut conn,
        &RelationalCommand::new("SELECT ACTIVE FROM USERS WHERE ID = 1").result_mapping(flag),
        &ParameterValues::new(),
    )?;
    let reader = executor.execute_reader(
        &mut conn,
        &RelationalCommand::new("SELECT * FROM USERS"),
        &ParameterValues::new(),
    )?;
    reader.close()?;

    let results: Vec<_> = diagnostics
        .events()
        .into_iter()
        .filter_map(|event| match event {
            CommandEvent::CommandExecuted { result, .. } => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(
        results,
        [CommandResult::Scalar(RowValues::Bool(true)), CommandResult::Reader]
    );
    // the disposing event belongs to the reader's execution
    let ids = command_ids(&diagnostics);
    assert_eq!(ids[2], ids[4]);
    Ok(())
}

#[test]
fn undecodable_scalar_is_reported_as_an_error() {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn =
        ScriptedConnection::with_outcomes([ScriptedOutcome::Scalar(NativeValue::Text("x".into()))]);
    let counters = conn.counters();
    let guid = TypeMappingCatalog::oracle()
        .find_by_kind(LogicalKind::Guid)
        .unwrap();

    let err = executor(&diagnostics)
        .execute_scalar(
            &mut conn,
            &RelationalCommand::new("SELECT TOKEN FROM USERS").result_mapping(guid),
            &ParameterValues::new(),
        )
        .unwrap_err();

    assert!(matches!(err, SqlMiddlewareDbError::ExecutionError(_)));
    assert_eq!(diagnostics.names(), ["command_executing", "command_error"]);
    assert_eq!(counters.closes(), 1);
}

#[tokio::test]
async fn cancelled_read_still_releases_the_reader() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::stalled_cursor(
        &["ID"],
        vec![vec![NativeValue::Int(1)]],
    )]);
    let counters = conn.counters();
    let token = CancellationToken::new();

    let mut reader = executor(&diagnostics)
        .execute_reader_async(
            &mut conn,
            &RelationalCommand::new("SELECT ID FROM SLOW_VIEW"),
            &ParameterValues::new(),
            &token,
        )
        .await?;
    assert!(reader.read_async(&token).await?);

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let err = reader.read_async(&token).await.unwrap_err();
    assert!(matches!(err, SqlMiddlewareDbError::Cancelled));
    assert_eq!(counters.closes(), 0);

    reader.close()?;
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.commands_disposed(), 1);
    assert_eq!(counters.parameters_cleared(), 1);
    assert_eq!(diagnostics.count("data_reader_disposing"), 1);
    Ok(())
}

#[tokio::test]
async fn buffering_stops_when_cancelled() -> Result<(), SqlMiddlewareDbError> {
    let diagnostics = RecordingDiagnostics::new();
    let mut conn = ScriptedConnection::with_outcomes([ScriptedOutcome::stalled_cursor(
        &["ID"],
        vec![vec![NativeValue::Int(1)], vec![NativeValue::Int(2)]],
    )]);
    let counters = conn.counters();
    let token = CancellationToken::new();

    let mut reader = executor(&diagnostics)
        .execute_reader_async(
            &mut conn,
            &RelationalCommand::new("SELECT ID FROM SLOW_VIEW"),
            &ParameterValues::new(),
            &token,
        )
        .await?;
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = reader.buffer_async(&[], &token).await.unwrap_err();
    assert!(matches!(err, SqlMiddlewareDbError::Cancelled));
    drop(reader);
    assert_eq!(counters.closes(), 1);
    Ok(())
}
