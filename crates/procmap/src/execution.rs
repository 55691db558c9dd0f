//! Execution context
//!
//! An [`ExecutionContext`] drives one call at a time through
//! `Idle -> ParametersLoaded -> Executed -> OutputsStored -> Idle`. It owns
//! the provider parameter slots of its compiled procedure, so it must not be
//! shared between concurrent calls; create one context per concurrent call.

use crate::{
    CompiledProcedure, CompiledResult, ErrorSite, ProcedureError, Result, ResultContainer,
    ResultEntity, ResultProcedure, StoredProcedure, runtime,
};
use procmap_core::{
    ConnectionState, DatabaseFacade, DbCommand, DbConnection, DbParameter, TypeInfo, Value,
};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    ParametersLoaded,
    Executed,
    OutputsStored,
}

/// Per-call state of a compiled procedure
pub struct ExecutionContext<P: StoredProcedure> {
    procedure: Arc<CompiledProcedure<P>>,
    slots: Vec<Option<DbParameter>>,
    state: ExecutionState,
}

impl<P: StoredProcedure> ExecutionContext<P> {
    pub fn new(procedure: Arc<CompiledProcedure<P>>) -> Self {
        let slots = procedure.parameters().iter().map(|_| None).collect();
        Self {
            procedure,
            slots,
            state: ExecutionState::Idle,
        }
    }

    pub fn procedure(&self) -> &Arc<CompiledProcedure<P>> {
        &self.procedure
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Provider parameter slots, index-aligned with the compiled parameters
    pub fn slots(&self) -> &[Option<DbParameter>] {
        &self.slots
    }

    /// The provider parameter for `name`, if its slot is materialized
    pub fn slot(&self, name: &str) -> Option<&DbParameter> {
        self.procedure
            .parameters()
            .iter()
            .position(|p| p.name().eq_ignore_ascii_case(name))
            .and_then(|index| self.slots.get(index))
            .and_then(Option::as_ref)
    }

    fn transition(&mut self, next: ExecutionState) {
        tracing::debug!(
            procedure = %self.procedure.procedure_name(),
            from = ?self.state,
            to = ?next,
            "execution state change"
        );
        self.state = next;
    }

    /// Materialize or refresh every provider parameter from `io`
    pub fn load_parameters(&mut self, io: &P::Io) {
        for (parameter, slot) in self.procedure.parameters().iter().zip(self.slots.iter_mut()) {
            parameter.load(slot, io);
        }
        self.transition(ExecutionState::ParametersLoaded);
    }

    /// Write every output, input/output and return value back into `io`
    pub fn store_outputs(&mut self, io: &mut P::Io) -> Result<()> {
        for (parameter, slot) in self.procedure.parameters().iter().zip(self.slots.iter()) {
            if parameter.is_output() {
                parameter.store(slot, io)?;
            }
        }
        self.transition(ExecutionState::OutputsStored);
        Ok(())
    }

    /// Drop every slot holding a native resource and return to `Idle`. Plain
    /// slots are kept for the next call.
    pub fn release(&mut self) {
        let mut released = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(DbParameter::owns_native_resource) {
                *slot = None;
                released += 1;
            }
        }
        if released > 0 {
            tracing::debug!(
                procedure = %self.procedure.procedure_name(),
                released,
                "released native parameter resources"
            );
        }
        self.transition(ExecutionState::Idle);
    }

    /// Run the procedure, blocking the current thread.
    ///
    /// Must not be called from within a Tokio runtime; use
    /// [`execute_async`](Self::execute_async) there.
    pub fn execute(&mut self, database: &dyn DatabaseFacade, io: &mut P::Io) -> Result<()> {
        runtime::block_on(self.execute_async(database, io))
    }

    pub async fn execute_async(
        &mut self,
        database: &dyn DatabaseFacade,
        io: &mut P::Io,
    ) -> Result<()> {
        self.run(database, io, None).await
    }

    pub async fn execute_cancellable(
        &mut self,
        database: &dyn DatabaseFacade,
        io: &mut P::Io,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run(database, io, Some(cancel)).await
    }

    #[tracing::instrument(
        skip(self, database, io, cancel),
        fields(procedure = %self.procedure.procedure_name())
    )]
    async fn run(
        &mut self,
        database: &dyn DatabaseFacade,
        io: &mut P::Io,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        check_cancelled(cancel)?;
        self.load_parameters(io);

        let connection = database.connection();
        let (mut command, attached) = self.command(database);
        let outcome = if self.procedure.has_result() {
            cancellable(cancel, discard_rows(connection.as_ref(), &mut command)).await
        } else {
            cancellable(cancel, scalar(connection.as_ref(), &mut command)).await
        };
        self.restore(command, attached);

        let value = match outcome {
            Ok(value) => value,
            Err(err) => return Err(self.abort(err)),
        };
        self.transition(ExecutionState::Executed);

        if !self.procedure.is_function()
            && let Some(index) = self.procedure.return_value_index()
            && let Some(Some(slot)) = self.slots.get_mut(index)
        {
            slot.value = value;
        }

        self.finish(io)
    }

    /// Move the provider parameters into a command. The return-value slot of
    /// a procedure stays behind; it receives the scalar result instead.
    fn command(&mut self, database: &dyn DatabaseFacade) -> (DbCommand, Vec<usize>) {
        let mut command = DbCommand::stored_procedure(self.procedure.procedure_name())
            .with_transaction(database.current_transaction());
        let is_function = self.procedure.is_function();

        let mut attached = Vec::with_capacity(self.slots.len());
        for (index, (parameter, slot)) in self
            .procedure
            .parameters()
            .iter()
            .zip(self.slots.iter_mut())
            .enumerate()
        {
            if parameter.is_return_value() && !is_function {
                continue;
            }
            if let Some(provider) = slot.take() {
                command.add_parameter(provider);
                attached.push(index);
            }
        }
        (command, attached)
    }

    /// Put the parameters of a finished command back into their slots
    fn restore(&mut self, command: DbCommand, attached: Vec<usize>) {
        for (index, provider) in attached.into_iter().zip(command.into_parameters()) {
            if let Some(slot) = self.slots.get_mut(index) {
                *slot = Some(provider);
            }
        }
    }

    fn finish(&mut self, io: &mut P::Io) -> Result<()> {
        let stored = self.store_outputs(io);
        self.release();
        stored
    }

    fn abort(&mut self, err: ProcedureError) -> ProcedureError {
        tracing::debug!(
            procedure = %self.procedure.procedure_name(),
            error = %err,
            "procedure call failed"
        );
        self.release();
        err
    }
}

impl<P: ResultProcedure> ExecutionContext<P> {
    /// Run a result-bearing procedure, blocking the current thread
    pub fn query(
        &mut self,
        database: &dyn DatabaseFacade,
        io: &mut P::Io,
    ) -> Result<ResultContainer<P::Row>> {
        runtime::block_on(self.query_async(database, io))
    }

    pub async fn query_async(
        &mut self,
        database: &dyn DatabaseFacade,
        io: &mut P::Io,
    ) -> Result<ResultContainer<P::Row>> {
        self.run_query(database, io, None).await
    }

    pub async fn query_cancellable(
        &mut self,
        database: &dyn DatabaseFacade,
        io: &mut P::Io,
        cancel: &CancellationToken,
    ) -> Result<ResultContainer<P::Row>> {
        self.run_query(database, io, Some(cancel)).await
    }

    #[tracing::instrument(
        skip(self, database, io, cancel),
        fields(procedure = %self.procedure.procedure_name(), result = %TypeInfo::of::<P::Row>())
    )]
    async fn run_query(
        &mut self,
        database: &dyn DatabaseFacade,
        io: &mut P::Io,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResultContainer<P::Row>> {
        let procedure = Arc::clone(&self.procedure);
        // Compile rejects result procedures without a matching result set.
        let Some(result) = procedure.result::<P::Row>() else {
            return Err(ProcedureError::configuration(
                ErrorSite::procedure(procedure.procedure_name()),
                format!("Procedure does not return rows of '{}'", TypeInfo::of::<P::Row>()),
            ));
        };

        check_cancelled(cancel)?;
        self.load_parameters(io);

        let connection = database.connection();
        let (mut command, attached) = self.command(database);
        let outcome = cancellable(cancel, rows(connection.as_ref(), &mut command, result)).await;
        self.restore(command, attached);

        let rows = match outcome {
            Ok(rows) => rows,
            Err(err) => return Err(self.abort(err)),
        };
        self.transition(ExecutionState::Executed);
        tracing::debug!(rows = rows.len(), "result materialized");

        self.finish(io)?;
        Ok(rows)
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(ProcedureError::Cancelled),
        _ => Ok(()),
    }
}

/// Race `call` against the cancellation token, if any
async fn cancellable<T>(
    cancel: Option<&CancellationToken>,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match cancel {
        None => call.await,
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(ProcedureError::Cancelled),
                result = call => result,
            }
        }
    }
}

async fn ensure_open(connection: &dyn DbConnection) -> Result<()> {
    if connection.state() == ConnectionState::Closed {
        tracing::debug!(driver = %connection.driver_name(), "opening connection");
        connection.open().await?;
    }
    Ok(())
}

async fn scalar(connection: &dyn DbConnection, command: &mut DbCommand) -> Result<Value> {
    ensure_open(connection).await?;
    Ok(connection.execute_scalar(command).await?)
}

async fn discard_rows(connection: &dyn DbConnection, command: &mut DbCommand) -> Result<Value> {
    ensure_open(connection).await?;
    let mut cursor = connection.execute_reader(command).await?;
    cursor.close().await?;
    Ok(Value::Null)
}

async fn rows<R: ResultEntity>(
    connection: &dyn DbConnection,
    command: &mut DbCommand,
    result: &CompiledResult<R>,
) -> Result<ResultContainer<R>> {
    ensure_open(connection).await?;
    let mut cursor = connection.execute_reader(command).await?;
    let rows = result.read_all(cursor.as_mut()).await;
    let closed = cursor.close().await;
    let rows = rows?;
    closed?;
    Ok(rows)
}
