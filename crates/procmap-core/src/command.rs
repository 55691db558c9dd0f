//! Commands handed to a driver for execution

use crate::{DbParameter, DbTransaction};
use std::sync::Arc;

/// How the driver should interpret [`DbCommand::text`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    /// The text is the verbatim name of a stored procedure or function
    #[default]
    StoredProcedure,
    /// The text is a SQL statement
    Text,
}

/// A single command bound to a name, a kind and a parameter set.
///
/// The command owns its parameters for the duration of the call; drivers
/// write output and return values into them in place.
#[derive(Debug)]
pub struct DbCommand {
    pub text: String,
    pub kind: CommandKind,
    pub transaction: Option<Arc<dyn DbTransaction>>,
    pub parameters: Vec<DbParameter>,
}

impl DbCommand {
    pub fn stored_procedure(name: impl Into<String>) -> Self {
        Self {
            text: name.into(),
            kind: CommandKind::StoredProcedure,
            transaction: None,
            parameters: Vec::new(),
        }
    }

    pub fn with_transaction(mut self, transaction: Option<Arc<dyn DbTransaction>>) -> Self {
        self.transaction = transaction;
        self
    }

    pub fn add_parameter(&mut self, parameter: DbParameter) {
        self.parameters.push(parameter);
    }

    /// Find a parameter by name (case-insensitive)
    pub fn parameter(&self, name: &str) -> Option<&DbParameter> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Find a parameter by name (case-insensitive) for writing
    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut DbParameter> {
        self.parameters
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Take the parameters back out of the command
    pub fn into_parameters(self) -> Vec<DbParameter> {
        self.parameters
    }
}
