//! Native resources handed out by the memory driver

use procmap_core::NativeResource;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Counters {
    created: AtomicUsize,
    released: AtomicUsize,
}

/// Counts native handles created and released, so tests can check that
/// parameter resources are freed after every call
#[derive(Debug, Clone, Default)]
pub struct NativeTracker {
    counters: Arc<Counters>,
}

impl NativeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> NativeHandle {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        NativeHandle {
            counters: self.counters.clone(),
        }
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Handles created but not yet dropped
    pub fn live(&self) -> usize {
        self.created() - self.released()
    }
}

/// A stand-in for a driver-owned buffer; released when dropped
#[derive(Debug)]
pub struct NativeHandle {
    counters: Arc<Counters>,
}

impl NativeResource for NativeHandle {}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}
