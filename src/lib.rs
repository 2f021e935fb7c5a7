//! Type mapping, parameter binding and command execution for Oracle-flavoured engines.
//!
//! The catalog resolves logical kinds and store type names to [`mapping::TypeMapping`]s,
//! each mapping renders literals and binds parameters, and the
//! [`command::CommandExecutor`] runs statements through a native driver while
//! guaranteeing cleanup and diagnostics on every path.

pub mod catalog;
pub mod command;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod mapping;
pub mod params;
pub mod prelude;
pub mod reader;
pub mod results;
pub mod teardown;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::SqlMiddlewareDbError;
pub use types::{LogicalKind, RowValues};
