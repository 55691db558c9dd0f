//! Procedure specifications and compiled procedures

use crate::execution::ExecutionContext;
use crate::parameter::validate_return_values;
use crate::result::ErasedResult;
use crate::{
    CompiledParameter, CompiledResult, ErrorSite, MappingOptions, ParameterSpec, ProcedureError,
    Result, ResultEntity, ResultSpec, StoredProcedure,
};
use procmap_core::{ParameterDirection, TypeInfo};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Everything needed to compile the mapping of command type `P`
pub struct ProcedureSpec<P: StoredProcedure> {
    name: Option<String>,
    is_function: bool,
    parameters: Vec<ParameterSpec<P::Io>>,
    result: Option<ResultSpec>,
}

impl<P: StoredProcedure> ProcedureSpec<P> {
    /// A stored procedure called by `name`, verbatim
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            is_function: false,
            parameters: Vec::new(),
            result: None,
        }
    }

    /// A function called by `name`. Its return value comes back through a
    /// `ReturnValue` parameter filled by the driver.
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            is_function: true,
            ..Self::new(name)
        }
    }

    /// A specification whose name has not been set yet
    pub fn unnamed() -> Self {
        Self {
            name: None,
            is_function: false,
            parameters: Vec::new(),
            result: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parameter(mut self, parameter: ParameterSpec<P::Io>) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn result(mut self, result: ResultSpec) -> Self {
        self.result = Some(result);
        self
    }

    /// Validate the specification and compile every accessor, parameter and
    /// result column. All mapping errors surface here.
    pub fn compile(&self, options: &MappingOptions) -> Result<CompiledProcedure<P>> {
        let command_type = TypeInfo::of::<P>();
        let name = match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                return Err(ProcedureError::configuration(
                    ErrorSite::procedure(command_type.short_name()),
                    "No procedure name has been provided!",
                ));
            }
        };
        let site = || ErrorSite::procedure(name.clone());

        tracing::debug!(
            procedure = %name,
            command = %command_type,
            function = self.is_function,
            parameters = self.parameters.len(),
            "compiling procedure"
        );

        validate_return_values(&name, &self.parameters)?;
        let has_return_value = self
            .parameters
            .iter()
            .any(|p| p.direction() == ParameterDirection::ReturnValue);

        if let Some(result) = &self.result {
            if self.is_function {
                return Err(ProcedureError::configuration(
                    site(),
                    "A function cannot have a result set!",
                ));
            }
            if has_return_value {
                return Err(ProcedureError::configuration(
                    site(),
                    "Procedure cannot have both a ReturnValue parameter and a result set!",
                ));
            }
            match P::result_type() {
                None => {
                    return Err(ProcedureError::configuration(
                        site(),
                        format!(
                            "Command type '{}' must be a result procedure to return rows of '{}'",
                            command_type,
                            result.result_type()
                        ),
                    ));
                }
                Some(declared) if declared != result.result_type() => {
                    return Err(ProcedureError::configuration(
                        site(),
                        format!(
                            "Result type '{}' does not match the result type '{}' declared by '{}'",
                            result.result_type(),
                            declared,
                            command_type
                        ),
                    ));
                }
                Some(_) => {}
            }
        } else if let Some(declared) = P::result_type() {
            return Err(ProcedureError::configuration(
                site(),
                format!(
                    "Command type '{}' returns rows of '{}' but no result set has been configured",
                    command_type, declared
                ),
            ));
        }

        let parameters = self
            .parameters
            .iter()
            .map(|parameter| parameter.compile(&name))
            .collect::<Result<Vec<_>>>()?;

        let result = self
            .result
            .as_ref()
            .map(|result| result.compile_erased(&name, options.column_lookup))
            .transpose()?;

        Ok(CompiledProcedure {
            procedure_name: name,
            is_function: self.is_function,
            parameters,
            result,
            command_type,
            _command: PhantomData,
        })
    }
}

/// The immutable, shareable mapping of one command type
pub struct CompiledProcedure<P: StoredProcedure> {
    procedure_name: String,
    is_function: bool,
    parameters: Vec<CompiledParameter<P::Io>>,
    result: Option<Arc<dyn ErasedResult>>,
    command_type: TypeInfo,
    _command: PhantomData<fn() -> P>,
}

impl<P: StoredProcedure> CompiledProcedure<P> {
    pub fn procedure_name(&self) -> &str {
        &self.procedure_name
    }

    pub fn is_function(&self) -> bool {
        self.is_function
    }

    /// Compiled parameters, in declaration order
    pub fn parameters(&self) -> &[CompiledParameter<P::Io>] {
        &self.parameters
    }

    pub fn command_type(&self) -> TypeInfo {
        self.command_type
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn result_type(&self) -> Option<TypeInfo> {
        self.result.as_ref().map(|result| result.result_type())
    }

    pub fn is_collection(&self) -> bool {
        self.result
            .as_ref()
            .is_some_and(|result| result.is_collection())
    }

    /// The compiled result, if it produces rows of `R`
    pub fn result<R: ResultEntity>(&self) -> Option<&CompiledResult<R>> {
        self.result
            .as_deref()?
            .as_any()
            .downcast_ref::<CompiledResult<R>>()
    }

    /// Index of the `ReturnValue` parameter, if one is declared
    pub fn return_value_index(&self) -> Option<usize> {
        self.parameters.iter().position(|p| p.is_return_value())
    }

    pub fn create_execution_context(self: &Arc<Self>) -> ExecutionContext<P> {
        ExecutionContext::new(Arc::clone(self))
    }
}

impl<P: StoredProcedure> fmt::Debug for CompiledProcedure<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProcedure")
            .field("procedure_name", &self.procedure_name)
            .field("is_function", &self.is_function)
            .field(
                "parameters",
                &self.parameters.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("result_type", &self.result_type())
            .field("command_type", &self.command_type)
            .finish()
    }
}

#[cfg(test)]
mod tests;
