//! Property accessors
//!
//! A [`Property`] is declared with the [`property!`](crate::property) macro,
//! which expands to plain function pointers reading and writing one field of
//! a container. Compiling a property wraps those pointers into type-erased
//! getters and setters working on [`Value`]s, once, so that no per-call lookup
//! or reflection happens while parameters are bound.

use crate::{ErrorSite, ProcedureError, Result};
use procmap_core::{ConversionError, SqlType, TypeInfo, Value, ValueKind};
use std::sync::Arc;

/// Reads a property of `C` as a driver value
pub type PropertyGetter<C> = Arc<dyn Fn(&C) -> Value + Send + Sync>;

/// Writes a driver value into a property of `C`
pub type PropertySetter<C> = Arc<dyn Fn(&mut C, Value) -> std::result::Result<(), ConversionError> + Send + Sync>;

/// A typed property of container `C`
pub struct Property<C, T> {
    name: &'static str,
    get: fn(&C) -> T,
    set: Option<fn(&mut C, T)>,
}

impl<C, T> Clone for Property<C, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, T> Copy for Property<C, T> {}

impl<C: 'static, T: SqlType> Property<C, T> {
    /// A property backed by a field
    pub fn stored(name: &'static str, get: fn(&C) -> T, set: fn(&mut C, T)) -> Self {
        Self {
            name,
            get,
            set: Some(set),
        }
    }

    /// A read-only property computed from other state
    pub fn computed(name: &'static str, get: fn(&C) -> T) -> Self {
        Self {
            name,
            get,
            set: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn has_storage(&self) -> bool {
        self.set.is_some()
    }

    pub fn compile_getter(&self) -> PropertyGetter<C> {
        let get = self.get;
        Arc::new(move |container: &C| get(container).into_value())
    }

    pub fn compile_setter(&self) -> Result<PropertySetter<C>> {
        let set = self.compile_setter_direct()?;
        Ok(Arc::new(move |container: &mut C, value: Value| {
            set(container, T::from_value(value)?);
            Ok(())
        }))
    }

    /// The raw typed setter, for callers that already hold a `T`
    pub fn compile_setter_direct(&self) -> Result<fn(&mut C, T)> {
        self.set.ok_or_else(|| {
            ProcedureError::configuration(
                ErrorSite::property(TypeInfo::of::<C>().short_name(), self.name),
                "Property has no backing storage and cannot be written",
            )
        })
    }
}

/// A property with its value type erased
pub trait PropertyAccess<C>: Send + Sync {
    fn name(&self) -> &str;

    fn type_info(&self) -> TypeInfo;

    fn kind(&self) -> ValueKind;

    fn has_storage(&self) -> bool;

    fn compile_getter(&self) -> PropertyGetter<C>;

    fn compile_setter(&self) -> Result<PropertySetter<C>>;
}

impl<C: 'static, T: SqlType> PropertyAccess<C> for Property<C, T> {
    fn name(&self) -> &str {
        self.name
    }

    fn type_info(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn kind(&self) -> ValueKind {
        T::KIND
    }

    fn has_storage(&self) -> bool {
        Property::has_storage(self)
    }

    fn compile_getter(&self) -> PropertyGetter<C> {
        Property::compile_getter(self)
    }

    fn compile_setter(&self) -> Result<PropertySetter<C>> {
        Property::compile_setter(self)
    }
}

/// Declare a [`Property`] of a container type.
///
/// ```ignore
/// // a field, readable and writable
/// property!(GetUserIo, user_id: i32)
/// // a computed value, read-only
/// property!(GetUserIo, display: String => |io| format!("#{}", io.user_id))
/// ```
#[macro_export]
macro_rules! property {
    ($container:ty, $field:ident : $ty:ty) => {
        $crate::Property::<$container, $ty>::stored(
            stringify!($field),
            |container: &$container| -> $ty { ::core::clone::Clone::clone(&container.$field) },
            |container: &mut $container, value: $ty| container.$field = value,
        )
    };
    ($container:ty, $name:ident : $ty:ty => $get:expr) => {
        $crate::Property::<$container, $ty>::computed(stringify!($name), $get)
    };
}

#[cfg(test)]
mod tests;
