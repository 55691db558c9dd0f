//! Constructors of result types

use super::ResultColumnSpec;
use procmap_core::{ConversionError, SqlType, TypeInfo, Value};

/// A type that result rows are materialized into
pub trait ResultEntity: Sized + Send + 'static {
    /// Every constructor the result compiler may choose from
    fn constructors() -> Vec<Constructor<Self>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructorParam {
    name: &'static str,
    type_info: TypeInfo,
}

impl ConstructorParam {
    pub fn of<T: SqlType>(name: &'static str) -> Self {
        Self {
            name,
            type_info: TypeInfo::of::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }
}

/// One way of building an `R` from column values
pub struct Constructor<R> {
    name: &'static str,
    params: Vec<ConstructorParam>,
    invoke: fn(&mut Arguments) -> Result<R, ConversionError>,
}

impl<R> Constructor<R> {
    pub fn new(
        name: &'static str,
        params: Vec<ConstructorParam>,
        invoke: fn(&mut Arguments) -> Result<R, ConversionError>,
    ) -> Self {
        Self {
            name,
            params,
            invoke,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[ConstructorParam] {
        &self.params
    }

    pub(crate) fn invoker(&self) -> fn(&mut Arguments) -> Result<R, ConversionError> {
        self.invoke
    }

    /// Match every parameter to exactly one column by name (ignoring case)
    /// and exact type. Returns the column index for each parameter, in
    /// parameter order.
    pub(crate) fn bind(&self, columns: &[ResultColumnSpec]) -> Option<Vec<usize>> {
        if self.params.len() != columns.len() {
            return None;
        }

        let mut order = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let mut candidates = columns.iter().enumerate().filter(|(_, column)| {
                column.property_name().eq_ignore_ascii_case(param.name)
                    && column.property_type() == param.type_info
            });
            let (index, _) = candidates.next()?;
            if candidates.next().is_some() || order.contains(&index) {
                return None;
            }
            order.push(index);
        }
        Some(order)
    }
}

/// Column values handed to a constructor, consumed in parameter order
#[derive(Debug)]
pub struct Arguments {
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Decode the next argument
    pub fn take<T: SqlType>(&mut self, name: &'static str) -> Result<T, ConversionError> {
        let value = self
            .values
            .next()
            .ok_or(ConversionError::MissingArgument(name))?;
        self.position += 1;
        T::from_value(value)
    }

    /// Number of arguments taken so far
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Declare a [`Constructor`] of a result type.
///
/// ```ignore
/// impl ResultEntity for User {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![
///             constructor!(User::new(id: i32, name: String)),
///             constructor!(User { id: i32, name: String }),
///         ]
///     }
/// }
/// ```
#[macro_export]
macro_rules! constructor {
    ($ty:ident :: $ctor:ident ( $($arg:ident : $argty:ty),* $(,)? )) => {
        $crate::Constructor::<$ty>::new(
            concat!(stringify!($ty), "::", stringify!($ctor)),
            vec![$($crate::ConstructorParam::of::<$argty>(stringify!($arg))),*],
            |args: &mut $crate::Arguments| -> ::core::result::Result<$ty, $crate::ConversionError> {
                ::core::result::Result::Ok($ty::$ctor($(args.take::<$argty>(stringify!($arg))?),*))
            },
        )
    };
    ($ty:ident { $($field:ident : $fty:ty),* $(,)? }) => {
        $crate::Constructor::<$ty>::new(
            concat!(stringify!($ty), " { .. }"),
            vec![$($crate::ConstructorParam::of::<$fty>(stringify!($field))),*],
            |args: &mut $crate::Arguments| -> ::core::result::Result<$ty, $crate::ConversionError> {
                ::core::result::Result::Ok($ty { $($field: args.take::<$fty>(stringify!($field))?),* })
            },
        )
    };
}
