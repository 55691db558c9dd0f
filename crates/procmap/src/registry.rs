//! Registry of compiled procedures
//!
//! The registry maps each command type to its compiled procedure. Writes are
//! rare (startup) and copy the map; reads clone the current snapshot and
//! never observe a partially updated map.

use crate::{
    CompiledProcedure, DuplicatePolicy, ErrorSite, MappingOptions, ProcedureError,
    ProcedureHandle, ProcedureSpec, Result, StoredProcedure,
};
use parking_lot::{Mutex, RwLock};
use procmap_core::{DatabaseFacade, TypeInfo};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type Entry = Arc<dyn Any + Send + Sync>;

type Snapshot = Arc<HashMap<TypeId, Entry>>;

/// Compiled procedures keyed by command type
pub struct ProcedureRegistry {
    procedures: RwLock<Snapshot>,
    writer: Mutex<()>,
    options: MappingOptions,
}

impl ProcedureRegistry {
    /// Create an empty registry with default options
    pub fn new() -> Self {
        Self::with_options(MappingOptions::default())
    }

    pub fn with_options(options: MappingOptions) -> Self {
        Self {
            procedures: RwLock::new(Arc::new(HashMap::new())),
            writer: Mutex::new(()),
            options,
        }
    }

    pub fn options(&self) -> &MappingOptions {
        &self.options
    }

    fn snapshot(&self) -> Snapshot {
        self.procedures.read().clone()
    }

    /// Compile `spec` and register the result
    pub fn build<P: StoredProcedure>(
        &self,
        spec: ProcedureSpec<P>,
    ) -> Result<Arc<CompiledProcedure<P>>> {
        let compiled = spec.compile(&self.options)?;
        self.register(compiled)
    }

    /// Register a compiled procedure under its command type.
    ///
    /// A second registration for the same command type is rejected or
    /// ignored according to [`MappingOptions::duplicate_registration`]; when
    /// ignored, the first registration is returned.
    pub fn register<P: StoredProcedure>(
        &self,
        compiled: CompiledProcedure<P>,
    ) -> Result<Arc<CompiledProcedure<P>>> {
        let key = TypeId::of::<P>();
        let _writer = self.writer.lock();
        let current = self.snapshot();

        if let Some(existing) = current.get(&key) {
            return match self.options.duplicate_registration {
                DuplicatePolicy::Reject => Err(ProcedureError::configuration(
                    ErrorSite::procedure(compiled.procedure_name()),
                    format!(
                        "Command type '{}' has already been registered",
                        TypeInfo::of::<P>()
                    ),
                )),
                DuplicatePolicy::Ignore => {
                    tracing::warn!(
                        procedure = %compiled.procedure_name(),
                        command = %TypeInfo::of::<P>(),
                        "duplicate procedure registration ignored"
                    );
                    downcast::<P>(existing.clone())
                }
            };
        }

        let compiled = Arc::new(compiled);
        let mut next = HashMap::clone(&current);
        next.insert(key, compiled.clone() as Entry);
        *self.procedures.write() = Arc::new(next);

        tracing::info!(
            procedure = %compiled.procedure_name(),
            command = %TypeInfo::of::<P>(),
            function = compiled.is_function(),
            "registered procedure"
        );
        Ok(compiled)
    }

    /// The compiled procedure of command type `P`
    pub fn resolve<P: StoredProcedure>(&self) -> Result<Arc<CompiledProcedure<P>>> {
        match self.snapshot().get(&TypeId::of::<P>()) {
            Some(entry) => downcast::<P>(entry.clone()),
            None => {
                tracing::warn!(command = %TypeInfo::of::<P>(), "procedure not registered");
                Err(not_registered::<P>())
            }
        }
    }

    pub fn contains<P: StoredProcedure>(&self) -> bool {
        self.snapshot().contains_key(&TypeId::of::<P>())
    }

    /// Create a command instance wired to `database` and a new execution
    /// context
    pub fn procedure<P: StoredProcedure>(&self, database: Arc<dyn DatabaseFacade>) -> Result<P> {
        let compiled = self.resolve::<P>()?;
        let context = compiled.create_execution_context();
        Ok(P::from_handle(ProcedureHandle::new(database, context)))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcedureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureRegistry")
            .field("procedures", &self.len())
            .field("options", &self.options)
            .finish()
    }
}

fn not_registered<P: StoredProcedure>() -> ProcedureError {
    ProcedureError::NotRegistered {
        procedure: TypeInfo::of::<P>().short_name(),
    }
}

fn downcast<P: StoredProcedure>(entry: Entry) -> Result<Arc<CompiledProcedure<P>>> {
    entry
        .downcast::<CompiledProcedure<P>>()
        .map_err(|_| not_registered::<P>())
}
