//! Transaction manager serializing access to a transactional resource
//!
//! ## Protocol
//!
//! ```text
//! read(f)    shared lock    f(&T)                      -> result
//! write(f)   exclusive lock f(&mut T) -> Ok  -> persist -> result
//!                                     -> Err -> discard -> original error
//! ```
//!
//! Readers run concurrently with each other but never with a writer. Writers
//! are serialized. The lock is eventually fair, so a waiting writer is not
//! starved by a stream of readers.
//!
//! A writable transaction either ends with exactly one `persist` or leaves
//! the resource as it was before the transaction began.

use atlas_core::Result;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// A resource with commit and rollback.
pub trait Transactional {
    /// Make every change since the last commit durable.
    fn persist(&mut self) -> Result<()>;

    /// Drop every change since the last commit.
    fn discard(&mut self) -> Result<()>;
}

/// Runs readable and writable transactions against one resource.
pub struct TransactionManager<T: Transactional> {
    resource: RwLock<T>,
    /// Number of committed writable transactions
    committed: AtomicU64,
    /// Number of rolled back writable transactions
    rolled_back: AtomicU64,
}

impl<T: Transactional> TransactionManager<T> {
    /// Manage `resource`.
    pub fn new(resource: T) -> Self {
        TransactionManager {
            resource: RwLock::new(resource),
            committed: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
        }
    }

    /// Run `f` with shared access.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> Result<R>) -> Result<R> {
        let guard = self.resource.read();
        f(&guard)
    }

    /// Run `f` with exclusive access, committing on success.
    ///
    /// When `f` fails the resource is rolled back and the error of `f` is
    /// returned unchanged. When the commit itself fails the resource is rolled
    /// back and the commit error is returned.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut guard = self.resource.write();
        let outcome = f(&mut guard).and_then(|value| {
            guard.persist()?;
            Ok(value)
        });
        match outcome {
            Ok(value) => {
                let count = self.committed.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(committed = count, "Committed writable transaction");
                Ok(value)
            }
            Err(e) => {
                self.rolled_back.fetch_add(1, Ordering::SeqCst);
                error!(error = %e, "Rolling back writable transaction");
                if let Err(discard_error) = guard.discard() {
                    error!(error = %discard_error, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Number of committed writable transactions.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    /// Number of rolled back writable transactions.
    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::SeqCst)
    }

    /// Release the managed resource.
    pub fn into_inner(self) -> T {
        self.resource.into_inner()
    }
}

impl<T: Transactional> std::fmt::Debug for TransactionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed", &self.committed())
            .field("rolled_back", &self.rolled_back())
            .finish()
    }
}
