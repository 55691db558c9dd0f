//! Error types for the procedure compiler and runtime

use procmap_core::{ConversionError, DriverError};
use std::fmt;
use thiserror::Error;

/// Where a mapping error originated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSite {
    Procedure {
        procedure: String,
    },
    Parameter {
        procedure: String,
        parameter: String,
    },
    Column {
        procedure: String,
        result: String,
        column: String,
    },
    Property {
        container: String,
        property: String,
    },
    Options,
}

impl ErrorSite {
    pub fn procedure(procedure: impl Into<String>) -> Self {
        ErrorSite::Procedure {
            procedure: procedure.into(),
        }
    }

    pub fn parameter(procedure: impl Into<String>, parameter: impl Into<String>) -> Self {
        ErrorSite::Parameter {
            procedure: procedure.into(),
            parameter: parameter.into(),
        }
    }

    pub fn column(
        procedure: impl Into<String>,
        result: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        ErrorSite::Column {
            procedure: procedure.into(),
            result: result.into(),
            column: column.into(),
        }
    }

    pub fn property(container: impl Into<String>, property: impl Into<String>) -> Self {
        ErrorSite::Property {
            container: container.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for ErrorSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSite::Procedure { procedure } => {
                write!(f, "In procedure or function '{}'", procedure)
            }
            ErrorSite::Parameter {
                procedure,
                parameter,
            } => write!(
                f,
                "Parameter '{}' in procedure or function '{}'",
                parameter, procedure
            ),
            ErrorSite::Column {
                procedure,
                result,
                column,
            } => write!(
                f,
                "Column '{}' of result '{}' in procedure or function '{}'",
                column, result, procedure
            ),
            ErrorSite::Property {
                container,
                property,
            } => write!(f, "Property '{}' of '{}'", property, container),
            ErrorSite::Options => write!(f, "mapping options"),
        }
    }
}

/// Main error type for procedure mapping
#[derive(Error, Debug)]
pub enum ProcedureError {
    /// The mapping is invalid. Raised while compiling, never during a call.
    #[error("'{message}' ({site})")]
    Configuration { site: ErrorSite, message: String },

    #[error("Procedure {procedure} has not been mapped or built.")]
    NotRegistered { procedure: String },

    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A value returned by the database could not be decoded
    #[error("'{source}' ({site})")]
    Data {
        site: ErrorSite,
        #[source]
        source: ConversionError,
    },

    #[error("Procedure call was cancelled")]
    Cancelled,
}

impl ProcedureError {
    pub fn configuration(site: ErrorSite, message: impl Into<String>) -> Self {
        ProcedureError::Configuration {
            site,
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ProcedureError::Configuration { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcedureError::Cancelled)
    }

    /// The driver error, if the call failed in the database layer
    pub fn as_driver(&self) -> Option<&DriverError> {
        match self {
            ProcedureError::Driver(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for procedure operations
pub type Result<T> = std::result::Result<T, ProcedureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_names_site() {
        let err = ProcedureError::configuration(
            ErrorSite::parameter("GetUser", "UserId"),
            "Parameter size cannot be negative",
        );
        assert_eq!(
            err.to_string(),
            "'Parameter size cannot be negative' (Parameter 'UserId' in procedure or function 'GetUser')"
        );
    }

    #[test]
    fn test_driver_error_is_transparent() {
        let err: ProcedureError = DriverError::Timeout("30s elapsed".into()).into();
        assert_eq!(err.to_string(), "Timeout: 30s elapsed");
        assert_eq!(
            err.as_driver(),
            Some(&DriverError::Timeout("30s elapsed".into()))
        );
    }

    #[test]
    fn test_column_site_display() {
        let site = ErrorSite::column("GetUser", "User", "name");
        assert_eq!(
            site.to_string(),
            "Column 'name' of result 'User' in procedure or function 'GetUser'"
        );
    }
}
