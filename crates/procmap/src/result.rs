//! Result row compiler
//!
//! A [`ResultSpec`] declares which columns feed which properties of a result
//! type. Compiling it picks the one constructor of the result type that takes
//! exactly those properties, resolves a conversion for every column, and
//! composes a row factory that turns the current row of a cursor into one
//! result object.

mod constructor;
mod container;
mod conversion;

pub use constructor::*;
pub use container::*;

use crate::converters::ColumnConverter;
use crate::{ColumnLookup, ErrorSite, ProcedureError, Result};
use procmap_core::{DriverResult, RowCursor, SqlType, TypeInfo, Value, ValueKind};
use std::any::Any;
use std::sync::Arc;

/// Declared mapping of one result column to one property of the result type
#[derive(Debug, Clone)]
pub struct ResultColumnSpec {
    column_name: String,
    property_name: String,
    property_type: TypeInfo,
    property_kind: ValueKind,
    accepts_null: bool,
    is_nullable: bool,
    converter: Option<ColumnConverter>,
    raw_kind: Option<ValueKind>,
}

impl ResultColumnSpec {
    /// Map the column of the same name to property `property_name` of type `T`
    pub fn new<T: SqlType>(property_name: impl Into<String>) -> Self {
        let property_name = property_name.into();
        Self {
            column_name: property_name.clone(),
            property_name,
            property_type: TypeInfo::of::<T>(),
            property_kind: T::KIND,
            accepts_null: T::NULLABLE,
            is_nullable: false,
            converter: None,
            raw_kind: None,
        }
    }

    /// Read from a differently named column
    pub fn column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = column_name.into();
        self
    }

    /// The column may hold NULL; the property must be an `Option`
    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    /// The kind the driver returns for this column. When it differs from the
    /// property's kind an automatic conversion is selected.
    pub fn raw_kind(mut self, kind: ValueKind) -> Self {
        self.raw_kind = Some(kind);
        self
    }

    pub fn with_conversion<Col: SqlType, Prop: SqlType>(self, f: fn(Col) -> Prop) -> Self {
        self.with_converter(ColumnConverter::new(f))
    }

    pub fn with_converter(mut self, converter: ColumnConverter) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn property_type(&self) -> TypeInfo {
        self.property_type
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    fn compile(
        &self,
        slot: usize,
        procedure: &str,
        result: &str,
    ) -> Result<CompiledResultColumn> {
        let site = ErrorSite::column(procedure, result, &self.column_name);
        tracing::debug!(
            procedure = %procedure,
            result = %result,
            column = %self.column_name,
            property = %self.property_name,
            nullable = self.is_nullable,
            "compiling result column"
        );

        if self.is_nullable && !self.accepts_null {
            return Err(ProcedureError::configuration(
                site,
                format!(
                    "Column is nullable but property '{}' of type '{}' cannot hold NULL",
                    self.property_name, self.property_type
                ),
            ));
        }

        let conversion = match (&self.converter, self.raw_kind) {
            (Some(converter), raw) => {
                if !converter.fits(self.property_type, self.property_kind, self.accepts_null) {
                    return Err(ProcedureError::configuration(
                        site,
                        format!(
                            "Converter produces '{}' but property '{}' is '{}'",
                            converter.output_type(),
                            self.property_name,
                            self.property_type
                        ),
                    ));
                }
                if let Some(raw) = raw.filter(|raw| *raw != converter.input_kind()) {
                    return Err(ProcedureError::configuration(
                        site,
                        format!(
                            "Converter reads {} but the column returns {}",
                            converter.input_kind(),
                            raw
                        ),
                    ));
                }
                Some(ColumnConversion::Custom(converter.clone()))
            }
            (None, Some(raw)) if raw != self.property_kind => {
                match conversion::automatic(raw, self.property_kind) {
                    Some(convert) => Some(ColumnConversion::Automatic(convert, self.property_kind)),
                    None => {
                        return Err(ProcedureError::configuration(
                            site,
                            format!(
                                "No automatic conversion from {} to '{}' for property '{}'; configure a converter",
                                raw, self.property_type, self.property_name
                            ),
                        ));
                    }
                }
            }
            _ => None,
        };

        let column_name = self.column_name.clone();
        let nullable = self.is_nullable;
        let factory_site = site.clone();
        let factory: ColumnFactory = Box::new(move |reader: &mut RowReader<'_>| {
            if nullable && reader.is_null(slot, &column_name)? {
                return Ok(Value::Null);
            }
            let raw = reader.value(slot, &column_name)?;
            let converted = match &conversion {
                None => Ok(raw),
                Some(ColumnConversion::Automatic(_, _)) if raw.is_null() => Ok(raw),
                Some(ColumnConversion::Automatic(convert, target)) => convert(raw, *target),
                Some(ColumnConversion::Custom(converter)) => converter.convert(raw),
            };
            converted.map_err(|source| ProcedureError::Data {
                site: factory_site.clone(),
                source,
            })
        });

        Ok(CompiledResultColumn {
            column_name: self.column_name.clone(),
            property_name: self.property_name.clone(),
            property_type: self.property_type,
            site,
            factory,
        })
    }
}

enum ColumnConversion {
    Automatic(conversion::Conversion, ValueKind),
    Custom(ColumnConverter),
}

/// Declared result of a procedure: the result type, single or collection,
/// and its column mappings
pub struct ResultSpec {
    result_type: TypeInfo,
    is_collection: bool,
    columns: Vec<ResultColumnSpec>,
    compiler: fn(&ResultSpec, &str, ColumnLookup) -> Result<Arc<dyn ErasedResult>>,
}

impl ResultSpec {
    /// At most one row, materialized into an `R`
    pub fn single<R: ResultEntity>() -> Self {
        Self::new::<R>(false)
    }

    /// Every row, materialized into `R`s
    pub fn collection<R: ResultEntity>() -> Self {
        Self::new::<R>(true)
    }

    fn new<R: ResultEntity>(is_collection: bool) -> Self {
        Self {
            result_type: TypeInfo::of::<R>(),
            is_collection,
            columns: Vec::new(),
            compiler: |spec, procedure, lookup| {
                let compiled = compile_result::<R>(procedure, spec, lookup)?;
                Ok(Arc::new(compiled) as Arc<dyn ErasedResult>)
            },
        }
    }

    pub fn column(mut self, column: ResultColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn result_type(&self) -> TypeInfo {
        self.result_type
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    pub fn columns(&self) -> &[ResultColumnSpec] {
        &self.columns
    }

    pub(crate) fn compile_erased(
        &self,
        procedure: &str,
        lookup: ColumnLookup,
    ) -> Result<Arc<dyn ErasedResult>> {
        (self.compiler)(self, procedure, lookup)
    }
}

/// Compile the result of `procedure` into a row factory for `R`
pub fn compile_result<R: ResultEntity>(
    procedure: &str,
    spec: &ResultSpec,
    lookup: ColumnLookup,
) -> Result<CompiledResult<R>> {
    let result_type = TypeInfo::of::<R>();
    let result_name = result_type.short_name();
    if spec.result_type != result_type {
        return Err(ProcedureError::configuration(
            ErrorSite::procedure(procedure),
            format!(
                "Result specification is for '{}' but was compiled for '{}'",
                spec.result_type, result_name
            ),
        ));
    }

    let constructors = R::constructors();
    let mut matching: Vec<(&Constructor<R>, Vec<usize>)> = constructors
        .iter()
        .filter_map(|ctor| ctor.bind(&spec.columns).map(|order| (ctor, order)))
        .collect();

    let (constructor, order) = match matching.len() {
        0 => {
            return Err(ProcedureError::configuration(
                ErrorSite::procedure(procedure),
                format!(
                    "Return type '{}' has no matching constructor for the mapped columns! Did you miss a mapping?",
                    result_name
                ),
            ));
        }
        1 => matching.remove(0),
        n => {
            let names: Vec<&str> = matching.iter().map(|(ctor, _)| ctor.name()).collect();
            return Err(ProcedureError::configuration(
                ErrorSite::procedure(procedure),
                format!(
                    "Return type '{}' has {} constructors matching the mapped columns: {}",
                    result_name,
                    n,
                    names.join(", ")
                ),
            ));
        }
    };

    if order.len() != constructor.params().len() || order.len() != spec.columns.len() {
        return Err(ProcedureError::configuration(
            ErrorSite::procedure(procedure),
            format!(
                "Constructor '{}' takes {} arguments but {} columns are mapped",
                constructor.name(),
                constructor.params().len(),
                spec.columns.len()
            ),
        ));
    }

    tracing::debug!(
        procedure = %procedure,
        result = %result_name,
        constructor = constructor.name(),
        columns = order.len(),
        "selected result constructor"
    );

    let columns = order
        .iter()
        .enumerate()
        .map(|(slot, &index)| spec.columns[index].compile(slot, procedure, &result_name))
        .collect::<Result<Vec<_>>>()?;
    let columns: Arc<[CompiledResultColumn]> = columns.into();

    let invoke = constructor.invoker();
    let factory_columns = Arc::clone(&columns);
    let procedure_site = ErrorSite::procedure(procedure);
    let row_factory: RowFactory<R> = Box::new(move |reader: &mut RowReader<'_>| {
        let mut values = Vec::with_capacity(factory_columns.len());
        for column in factory_columns.iter() {
            values.push((column.factory)(reader)?);
        }

        let mut args = Arguments::new(values);
        invoke(&mut args).map_err(|source| {
            let failed = args.position().saturating_sub(1);
            let site = factory_columns
                .get(failed)
                .map(|column| column.site.clone())
                .unwrap_or_else(|| procedure_site.clone());
            ProcedureError::Data { site, source }
        })
    });

    Ok(CompiledResult {
        is_collection: spec.is_collection,
        result_type,
        constructor: constructor.name(),
        columns,
        lookup,
        row_factory,
    })
}

type ColumnFactory = Box<dyn Fn(&mut RowReader<'_>) -> Result<Value> + Send + Sync>;

type RowFactory<R> = Box<dyn Fn(&mut RowReader<'_>) -> Result<R> + Send + Sync>;

/// A column read fully resolved at compile time: lookup, NULL check and
/// conversion
pub struct CompiledResultColumn {
    column_name: String,
    property_name: String,
    property_type: TypeInfo,
    site: ErrorSite,
    factory: ColumnFactory,
}

impl CompiledResultColumn {
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn property_type(&self) -> TypeInfo {
        self.property_type
    }

    /// Read this column from the reader's current row
    pub fn read(&self, reader: &mut RowReader<'_>) -> Result<Value> {
        (self.factory)(reader)
    }
}

/// The compiled result of one procedure
pub struct CompiledResult<R> {
    is_collection: bool,
    result_type: TypeInfo,
    constructor: &'static str,
    columns: Arc<[CompiledResultColumn]>,
    lookup: ColumnLookup,
    row_factory: RowFactory<R>,
}

impl<R: ResultEntity> CompiledResult<R> {
    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    pub fn result_type(&self) -> TypeInfo {
        self.result_type
    }

    /// Name of the selected constructor
    pub fn constructor(&self) -> &'static str {
        self.constructor
    }

    /// Compiled columns, in constructor argument order
    pub fn columns(&self) -> &[CompiledResultColumn] {
        &self.columns
    }

    /// An empty ordinal cache for one result set
    pub fn ordinal_cache(&self) -> Vec<Option<usize>> {
        vec![None; self.columns.len()]
    }

    /// Materialize the cursor's current row
    pub fn read_row(&self, cursor: &dyn RowCursor, ordinals: &mut [Option<usize>]) -> Result<R> {
        let mut reader = RowReader::new(cursor, self.lookup, ordinals);
        (self.row_factory)(&mut reader)
    }

    /// Materialize a whole result set. A single result reads at most the
    /// first row.
    pub async fn read_all(&self, cursor: &mut dyn RowCursor) -> Result<ResultContainer<R>> {
        let mut ordinals = self.ordinal_cache();
        if self.is_collection {
            let mut rows = Vec::new();
            while cursor.read().await? {
                let row = self.read_row(&*cursor, &mut ordinals)?;
                rows.push(row);
            }
            Ok(ResultContainer::Collection(rows))
        } else if cursor.read().await? {
            let row = self.read_row(&*cursor, &mut ordinals)?;
            Ok(ResultContainer::Single(Some(row)))
        } else {
            Ok(ResultContainer::Single(None))
        }
    }
}

/// Column access to the current row of a cursor, with ordinals resolved by
/// name or from a per-result-set cache
pub struct RowReader<'a> {
    cursor: &'a dyn RowCursor,
    lookup: ColumnLookup,
    ordinals: &'a mut [Option<usize>],
}

impl<'a> RowReader<'a> {
    pub fn new(
        cursor: &'a dyn RowCursor,
        lookup: ColumnLookup,
        ordinals: &'a mut [Option<usize>],
    ) -> Self {
        Self {
            cursor,
            lookup,
            ordinals,
        }
    }

    fn ordinal(&mut self, slot: usize, name: &str) -> DriverResult<usize> {
        if self.lookup == ColumnLookup::ByName {
            return self.cursor.ordinal(name);
        }
        match self.ordinals.get(slot).copied().flatten() {
            Some(ordinal) => Ok(ordinal),
            None => {
                let ordinal = self.cursor.ordinal(name)?;
                if let Some(cached) = self.ordinals.get_mut(slot) {
                    *cached = Some(ordinal);
                }
                Ok(ordinal)
            }
        }
    }

    pub fn value(&mut self, slot: usize, name: &str) -> DriverResult<Value> {
        let ordinal = self.ordinal(slot, name)?;
        self.cursor.value(ordinal)
    }

    pub fn is_null(&mut self, slot: usize, name: &str) -> DriverResult<bool> {
        let ordinal = self.ordinal(slot, name)?;
        self.cursor.is_null(ordinal)
    }
}

/// A compiled result with its row type erased, as stored in a compiled
/// procedure
pub(crate) trait ErasedResult: Send + Sync {
    fn is_collection(&self) -> bool;

    fn result_type(&self) -> TypeInfo;

    fn as_any(&self) -> &dyn Any;
}

impl<R: ResultEntity> ErasedResult for CompiledResult<R> {
    fn is_collection(&self) -> bool {
        self.is_collection
    }

    fn result_type(&self) -> TypeInfo {
        self.result_type
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
