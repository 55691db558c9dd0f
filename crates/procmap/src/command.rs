//! Command objects
//!
//! A command type stands for one stored procedure or function. Instances are
//! created by [`ProcedureRegistry::procedure`](crate::ProcedureRegistry::procedure),
//! which injects the database facade and a fresh execution context through a
//! [`ProcedureHandle`]. Declare command types with [`stored_procedure!`](crate::stored_procedure).

use crate::{ExecutionContext, Result, ResultContainer, ResultEntity};
use async_trait::async_trait;
use procmap_core::{DatabaseFacade, TypeInfo};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A command type mapped to a stored procedure or function
#[async_trait]
pub trait StoredProcedure: Sized + Send + Sync + 'static {
    /// The I/O container supplying inputs and receiving outputs
    type Io: Send + 'static;

    /// The row type this command returns, if it is a result procedure
    fn result_type() -> Option<TypeInfo> {
        None
    }

    fn from_handle(handle: ProcedureHandle<Self>) -> Self;

    fn handle(&self) -> &ProcedureHandle<Self>;

    fn handle_mut(&mut self) -> &mut ProcedureHandle<Self>;

    /// Call the procedure, blocking the current thread
    fn execute(&mut self, io: &mut Self::Io) -> Result<()> {
        self.handle_mut().execute(io)
    }

    async fn execute_async(&mut self, io: &mut Self::Io) -> Result<()> {
        self.handle_mut().execute_async(io).await
    }

    async fn execute_cancellable(
        &mut self,
        io: &mut Self::Io,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.handle_mut().execute_cancellable(io, cancel).await
    }
}

/// A command type whose procedure returns rows
#[async_trait]
pub trait ResultProcedure: StoredProcedure {
    type Row: ResultEntity;

    /// Call the procedure and materialize its rows, blocking the current thread
    fn query(&mut self, io: &mut Self::Io) -> Result<ResultContainer<Self::Row>> {
        self.handle_mut().query(io)
    }

    async fn query_async(&mut self, io: &mut Self::Io) -> Result<ResultContainer<Self::Row>> {
        self.handle_mut().query_async(io).await
    }

    async fn query_cancellable(
        &mut self,
        io: &mut Self::Io,
        cancel: &CancellationToken,
    ) -> Result<ResultContainer<Self::Row>> {
        self.handle_mut().query_cancellable(io, cancel).await
    }
}

/// The handles injected into a command instance: the database facade and the
/// instance's execution context
pub struct ProcedureHandle<P: StoredProcedure> {
    database: Arc<dyn DatabaseFacade>,
    context: ExecutionContext<P>,
}

impl<P: StoredProcedure> ProcedureHandle<P> {
    pub fn new(database: Arc<dyn DatabaseFacade>, context: ExecutionContext<P>) -> Self {
        Self { database, context }
    }

    pub fn database(&self) -> &Arc<dyn DatabaseFacade> {
        &self.database
    }

    pub fn context(&self) -> &ExecutionContext<P> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext<P> {
        &mut self.context
    }

    pub fn execute(&mut self, io: &mut P::Io) -> Result<()> {
        self.context.execute(self.database.as_ref(), io)
    }

    pub async fn execute_async(&mut self, io: &mut P::Io) -> Result<()> {
        self.context.execute_async(self.database.as_ref(), io).await
    }

    pub async fn execute_cancellable(
        &mut self,
        io: &mut P::Io,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.context
            .execute_cancellable(self.database.as_ref(), io, cancel)
            .await
    }
}

impl<P: ResultProcedure> ProcedureHandle<P> {
    pub fn query(&mut self, io: &mut P::Io) -> Result<ResultContainer<P::Row>> {
        self.context.query(self.database.as_ref(), io)
    }

    pub async fn query_async(&mut self, io: &mut P::Io) -> Result<ResultContainer<P::Row>> {
        self.context.query_async(self.database.as_ref(), io).await
    }

    pub async fn query_cancellable(
        &mut self,
        io: &mut P::Io,
        cancel: &CancellationToken,
    ) -> Result<ResultContainer<P::Row>> {
        self.context
            .query_cancellable(self.database.as_ref(), io, cancel)
            .await
    }
}

impl<P: StoredProcedure> fmt::Debug for ProcedureHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureHandle")
            .field("procedure", &self.context.procedure().procedure_name())
            .field("state", &self.context.state())
            .finish()
    }
}

/// Declare a command type.
///
/// ```ignore
/// stored_procedure! {
///     /// Looks up one user
///     pub struct GetUser: GetUserIo => User;
/// }
///
/// stored_procedure! {
///     pub struct Transfer: TransferIo;
/// }
/// ```
#[macro_export]
macro_rules! stored_procedure {
    ($(#[$meta:meta])* $vis:vis struct $name:ident : $io:ty => $row:ty ;) => {
        $(#[$meta])*
        $vis struct $name {
            handle: $crate::ProcedureHandle<$name>,
        }

        impl $crate::StoredProcedure for $name {
            type Io = $io;

            fn result_type() -> ::core::option::Option<$crate::TypeInfo> {
                ::core::option::Option::Some($crate::TypeInfo::of::<$row>())
            }

            fn from_handle(handle: $crate::ProcedureHandle<Self>) -> Self {
                Self { handle }
            }

            fn handle(&self) -> &$crate::ProcedureHandle<Self> {
                &self.handle
            }

            fn handle_mut(&mut self) -> &mut $crate::ProcedureHandle<Self> {
                &mut self.handle
            }
        }

        impl $crate::ResultProcedure for $name {
            type Row = $row;
        }
    };
    ($(#[$meta:meta])* $vis:vis struct $name:ident : $io:ty ;) => {
        $(#[$meta])*
        $vis struct $name {
            handle: $crate::ProcedureHandle<$name>,
        }

        impl $crate::StoredProcedure for $name {
            type Io = $io;

            fn from_handle(handle: $crate::ProcedureHandle<Self>) -> Self {
                Self { handle }
            }

            fn handle(&self) -> &$crate::ProcedureHandle<Self> {
                &self.handle
            }

            fn handle_mut(&mut self) -> &mut $crate::ProcedureHandle<Self> {
                &mut self.handle
            }
        }
    };
}
