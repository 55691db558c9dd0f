//! Provider-level parameters sent to the driver

use crate::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a procedure parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the parameter's value is sent to the database
    pub fn is_input(self) -> bool {
        matches!(self, ParameterDirection::Input | ParameterDirection::InputOutput)
    }

    /// Whether the database writes the parameter's value back
    pub fn is_output(self) -> bool {
        matches!(
            self,
            ParameterDirection::Output
                | ParameterDirection::InputOutput
                | ParameterDirection::ReturnValue
        )
    }
}

impl fmt::Display for ParameterDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterDirection::Input => "Input",
            ParameterDirection::Output => "Output",
            ParameterDirection::InputOutput => "InputOutput",
            ParameterDirection::ReturnValue => "ReturnValue",
        };
        f.write_str(name)
    }
}

/// A driver-owned resource attached to a parameter (bind buffers, LOB
/// locators, ...). It is released by dropping it.
pub trait NativeResource: Send + Sync + fmt::Debug {}

/// A parameter as handed to the driver.
///
/// Parameters are allocated once per execution context slot and reused across
/// calls; drivers write output values back into [`DbParameter::value`].
#[derive(Debug)]
pub struct DbParameter {
    pub name: String,
    pub direction: ParameterDirection,
    pub size: Option<u32>,
    /// Kind of the bound property, so drivers can type NULL values
    pub kind: ValueKind,
    pub value: Value,
    native: Option<Box<dyn NativeResource>>,
}

impl DbParameter {
    pub fn new(name: impl Into<String>, direction: ParameterDirection, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            direction,
            size: None,
            kind,
            value: Value::Null,
            native: None,
        }
    }

    pub fn with_size(mut self, size: Option<u32>) -> Self {
        self.size = size;
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    /// Attach a driver-native resource to this parameter
    pub fn attach_native(&mut self, resource: Box<dyn NativeResource>) {
        self.native = Some(resource);
    }

    pub fn native(&self) -> Option<&dyn NativeResource> {
        self.native.as_deref()
    }

    /// Whether the parameter holds a native resource that must be released
    /// after the call
    pub fn owns_native_resource(&self) -> bool {
        self.native.is_some()
    }
}
