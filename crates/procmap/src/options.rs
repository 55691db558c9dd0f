//! Mapping options
//!
//! Options are plain serde structs so they can live in the application's TOML
//! configuration:
//!
//! ```toml
//! duplicate_registration = "ignore"
//! column_lookup = "by_name"
//! ```

use crate::{ErrorSite, ProcedureError, Result};
use serde::{Deserialize, Serialize};

/// What to do when a command type is registered a second time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with a configuration error
    #[default]
    Reject,
    /// Keep the first registration and log a warning
    Ignore,
}

/// How result columns are located in a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnLookup {
    /// Resolve the column ordinal by name on every read
    ByName,
    /// Resolve each ordinal once per result set
    #[default]
    CachedOrdinal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingOptions {
    pub duplicate_registration: DuplicatePolicy,
    pub column_lookup: ColumnLookup,
}

impl MappingOptions {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| {
            ProcedureError::configuration(
                ErrorSite::Options,
                format!("Invalid mapping options: {}", e),
            )
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| {
            ProcedureError::configuration(
                ErrorSite::Options,
                format!("Cannot serialize mapping options: {}", e),
            )
        })
    }
}
