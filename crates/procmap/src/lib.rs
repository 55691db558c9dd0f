//! procmap - procedure mapping compiler and runtime
//!
//! Maps command types to stored procedures and functions, and result rows to
//! result types. Mappings are declared once, compiled into reusable binding
//! functions, cached in a [`ProcedureRegistry`] and driven per call by an
//! [`ExecutionContext`]:
//!
//! - `property!` - Compile-time accessors for I/O container fields
//! - `ParameterSpec` / `CompiledParameter` - Parameter binding
//! - `ResultSpec` / `CompiledResult` - Constructor selection and row factories
//! - `ProcedureSpec` / `CompiledProcedure` - Validation and the compiled artifact
//! - `ProcedureRegistry` - Command type to compiled procedure
//! - `ExecutionContext` - Load, execute, store, release
//! - `StoredProcedure` / `ResultProcedure` - Command objects

mod accessor;
mod command;
pub mod converters;
mod error;
mod execution;
mod options;
mod parameter;
mod procedure;
mod registry;
mod result;
pub mod runtime;

pub use accessor::*;
pub use command::*;
pub use converters::{ColumnConverter, Json};
pub use error::*;
pub use execution::*;
pub use options::*;
pub use parameter::{CompiledParameter, ParameterSpec};
pub use procedure::*;
pub use registry::*;
pub use result::{
    Arguments, CompiledResult, CompiledResultColumn, Constructor, ConstructorParam,
    ResultColumnSpec, ResultContainer, ResultEntity, ResultSpec, RowReader, compile_result,
};

pub use procmap_core;
pub use procmap_core::{
    ConversionError, Database, DatabaseFacade, DriverError, ParameterDirection, SqlType,
    TypeInfo, Value, ValueKind,
};
pub use tokio_util::sync::CancellationToken;
