//! Tokio runtime for the blocking execution API
//!
//! Drivers are async. The blocking `execute`/`query` entry points run the
//! async path to completion on a shared runtime, so they must not be called
//! from inside another Tokio runtime.

use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::Runtime;

static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get or create the shared runtime for blocking procedure calls.
///
/// # Panics
///
/// Panics if the runtime cannot be created.
pub fn get_tokio_runtime() -> &'static Runtime {
    TOKIO_RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("procmap-runtime")
            .build()
            .expect("Failed to create Tokio runtime for blocking procedure calls")
    })
}

/// Run a future to completion on the shared runtime, blocking the current
/// thread
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future,
{
    get_tokio_runtime().block_on(future)
}
