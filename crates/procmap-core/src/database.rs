//! The database facade handed to command objects

use crate::{DbConnection, DbTransaction};
use parking_lot::RwLock;
use std::sync::Arc;

/// What a command object needs from the surrounding data-access layer: a
/// connection and the ambient transaction, if any.
pub trait DatabaseFacade: Send + Sync {
    fn connection(&self) -> Arc<dyn DbConnection>;

    fn current_transaction(&self) -> Option<Arc<dyn DbTransaction>>;
}

/// A plain facade over one shared connection
pub struct Database {
    connection: Arc<dyn DbConnection>,
    transaction: RwLock<Option<Arc<dyn DbTransaction>>>,
}

impl Database {
    pub fn new(connection: Arc<dyn DbConnection>) -> Self {
        Self {
            connection,
            transaction: RwLock::new(None),
        }
    }

    /// Enlist every following command in `transaction`
    pub fn set_transaction(&self, transaction: Arc<dyn DbTransaction>) {
        tracing::debug!(transaction = %transaction.id(), "ambient transaction set");
        *self.transaction.write() = Some(transaction);
    }

    pub fn clear_transaction(&self) -> Option<Arc<dyn DbTransaction>> {
        self.transaction.write().take()
    }
}

impl DatabaseFacade for Database {
    fn connection(&self) -> Arc<dyn DbConnection> {
        self.connection.clone()
    }

    fn current_transaction(&self) -> Option<Arc<dyn DbTransaction>> {
        self.transaction.read().clone()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("driver", &self.connection.driver_name())
            .field("transaction", &*self.transaction.read())
            .finish()
    }
}
