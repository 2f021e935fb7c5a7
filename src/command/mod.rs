// Command execution
//
// - text: statement text adjustment
// - shape: blocking vs async call shape
// - executor: CommandExecutor and its cleanup guards

mod executor;
pub(crate) mod shape;
mod text;

pub use executor::CommandExecutor;
pub use shape::CallShape;
pub use text::adjust_command_text;

use tracing::trace;

use crate::mapping::TypeMapping;
use crate::params::CommandParameter;

/// A statement plus the parameters it declares.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationalCommand {
    text: String,
    parameters: Vec<CommandParameter>,
    result_mapping: Option<TypeMapping>,
}

impl RelationalCommand {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
            result_mapping: None,
        }
    }

    /// Declare a parameter bound through `mapping`.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, mapping: TypeMapping) -> Self {
        self.parameters.push(CommandParameter::new(name, mapping));
        self
    }

    /// Decode scalar results through `mapping` instead of by value shape.
    #[must_use]
    pub fn result_mapping(mut self, mapping: TypeMapping) -> Self {
        self.result_mapping = Some(mapping);
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn parameters(&self) -> &[CommandParameter] {
        &self.parameters
    }

    #[must_use]
    pub fn scalar_mapping(&self) -> Option<&TypeMapping> {
        self.result_mapping.as_ref()
    }
}

/// Lifecycle of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Preparing,
    Executing,
    Succeeded,
    Failed,
    Released,
}

impl ExecutionState {
    pub(crate) fn advance(&mut self, next: ExecutionState) {
        let from = *self;
        trace!(?from, to = ?next, "execution state");
        *self = next;
    }
}
