//! Parameter specifications and the parameter binder

use crate::accessor::{Property, PropertyAccess, PropertyGetter, PropertySetter};
use crate::{ErrorSite, ProcedureError, Result};
use procmap_core::{DbParameter, ParameterDirection, SqlType, TypeInfo, Value, ValueKind};
use std::sync::Arc;

/// Declared mapping between one procedure parameter and one property of the
/// I/O container `C`
pub struct ParameterSpec<C> {
    name: String,
    direction: ParameterDirection,
    size: Option<u32>,
    property: Arc<dyn PropertyAccess<C>>,
}

impl<C: 'static> ParameterSpec<C> {
    pub fn new<T: SqlType>(
        name: impl Into<String>,
        direction: ParameterDirection,
        property: Property<C, T>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            size: None,
            property: Arc::new(property),
        }
    }

    pub fn input<T: SqlType>(name: impl Into<String>, property: Property<C, T>) -> Self {
        Self::new(name, ParameterDirection::Input, property)
    }

    pub fn output<T: SqlType>(name: impl Into<String>, property: Property<C, T>) -> Self {
        Self::new(name, ParameterDirection::Output, property)
    }

    pub fn input_output<T: SqlType>(name: impl Into<String>, property: Property<C, T>) -> Self {
        Self::new(name, ParameterDirection::InputOutput, property)
    }

    /// A return-value parameter. The database never sees its name, so one is
    /// generated.
    pub fn return_value<T: SqlType>(property: Property<C, T>) -> Self {
        let name = format!("ReturnValue_{}", uuid::Uuid::new_v4().simple());
        Self::new(name, ParameterDirection::ReturnValue, property)
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> ParameterDirection {
        self.direction
    }

    pub fn size(&self) -> Option<u32> {
        self.size
    }

    pub fn property_name(&self) -> &str {
        self.property.name()
    }

    pub fn property_type(&self) -> TypeInfo {
        self.property.type_info()
    }

    /// Compile the accessors of this parameter.
    ///
    /// A setter is only compiled for directions that receive a value back,
    /// so computed properties can still feed input parameters.
    pub fn compile(&self, procedure: &str) -> Result<CompiledParameter<C>> {
        tracing::debug!(
            procedure = %procedure,
            parameter = %self.name,
            direction = %self.direction,
            property = %self.property.name(),
            "compiling parameter"
        );

        let getter = self.property.compile_getter();
        let setter = if self.direction.is_output() {
            let setter = self.property.compile_setter().map_err(|err| match err {
                ProcedureError::Configuration { message, .. } => ProcedureError::configuration(
                    ErrorSite::parameter(procedure, &self.name),
                    format!("{} (property '{}')", message, self.property.name()),
                ),
                other => other,
            })?;
            Some(setter)
        } else {
            None
        };

        Ok(CompiledParameter {
            name: self.name.clone(),
            direction: self.direction,
            size: self.size,
            kind: self.property.kind(),
            property_name: self.property.name().to_string(),
            procedure: procedure.to_string(),
            getter,
            setter,
        })
    }
}

/// A parameter ready to move values between an I/O container and a provider
/// parameter slot. Shared read-only by every execution context.
pub struct CompiledParameter<C> {
    name: String,
    direction: ParameterDirection,
    size: Option<u32>,
    kind: ValueKind,
    property_name: String,
    procedure: String,
    getter: PropertyGetter<C>,
    setter: Option<PropertySetter<C>>,
}

impl<C> CompiledParameter<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> ParameterDirection {
        self.direction
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn is_output(&self) -> bool {
        self.setter.is_some()
    }

    pub fn is_return_value(&self) -> bool {
        self.direction == ParameterDirection::ReturnValue
    }

    /// Materialize the provider parameter for this slot and refresh its value.
    ///
    /// Output-only slots are reset to NULL so a previous call's value is never
    /// sent or read back.
    pub fn load(&self, slot: &mut Option<DbParameter>, container: &C) {
        let parameter = slot.get_or_insert_with(|| {
            DbParameter::new(self.name.clone(), self.direction, self.kind).with_size(self.size)
        });

        parameter.value = if self.direction.is_input() {
            (self.getter)(container)
        } else {
            Value::Null
        };
    }

    /// Write the provider parameter's value back into the container
    pub fn store(&self, slot: &Option<DbParameter>, container: &mut C) -> Result<()> {
        let Some(setter) = &self.setter else {
            return Ok(());
        };
        let value = slot
            .as_ref()
            .map(|parameter| parameter.value.clone())
            .unwrap_or(Value::Null);

        setter(container, value).map_err(|source| ProcedureError::Data {
            site: ErrorSite::parameter(&self.procedure, &self.name),
            source,
        })
    }
}

/// Reject procedures declaring more than one return-value parameter. The
/// error names every offending parameter.
pub(crate) fn validate_return_values<C: 'static>(
    procedure: &str,
    parameters: &[ParameterSpec<C>],
) -> Result<()> {
    let returns: Vec<&str> = parameters
        .iter()
        .filter(|p| p.direction() == ParameterDirection::ReturnValue)
        .map(|p| p.name())
        .collect();

    if returns.len() > 1 {
        return Err(ProcedureError::configuration(
            ErrorSite::procedure(procedure),
            format!(
                "Only one ReturnValue parameter is allowed; found {}: {}",
                returns.len(),
                returns.join(",")
            ),
        ));
    }
    Ok(())
}
