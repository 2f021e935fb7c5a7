//! Convenient imports for common functionality.

pub use crate::catalog::{CatalogEntry, MappingQuery, TypeMappingCatalog};
pub use crate::command::{CallShape, CommandExecutor, ExecutionState, RelationalCommand};
pub use crate::config::{
    ExecutorOptions, ExecutorOptionsBuilder, TeardownOptions, TeardownOptionsBuilder,
};
pub use crate::diagnostics::{
    CommandContext, CommandErrorInfo, CommandEvent, CommandResult, DiagnosticsListener,
    ExecutionMode, TracingDiagnostics,
};
pub use crate::driver::{
    CommandSpec, DbCommand, DbConnection, DbCursor, DriverError, NativeTimestampTz, NativeValue,
    ProviderTypeTag,
};
pub use crate::error::{CommandFailure, ErrorKind, SqlMiddlewareDbError};
pub use crate::mapping::{
    MappingFacets, ProviderCodec, StoreTypePostfix, TypeMapping, TypeMappingBuilder,
    ValueConverter,
};
pub use crate::params::{
    BoundParameter, CommandParameter, ParameterValues, bind_parameter, bind_parameters,
};
pub use crate::reader::{RelationalDataReader, ResultCursorAdapter};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::teardown::{PoolControl, TeardownProtocol, is_resource_busy};
pub use crate::types::{FloatWidth, IntWidth, LogicalKind, RowValues};

pub use tokio_util::sync::CancellationToken;
