use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};
use crate::ApiError;

/// Physical transaction primitives of a store.
pub trait TransactionControl {
    fn begin(&self) -> Result<(), ApiError>;
    fn commit(&self) -> Result<(), ApiError>;
    fn rollback(&self) -> Result<(), ApiError>;
}

/// Nesting bookkeeping for one store instance.
///
/// Only the outermost call opens a physical transaction; nested calls join
/// it and leave commit or rollback to the opener. The depth lives on the
/// instance, so separate stores never share transaction state.
#[derive(Debug, Default)]
pub struct TransactionCoordinator {
    depth: AtomicUsize,
}

impl TransactionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.depth() > 0
    }

    /// Commit unless `callback` fails. The opener rolls back on failure and
    /// the error is returned unchanged.
    pub fn wrap<T, F>(&self, control: &dyn TransactionControl, callback: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Result<T, ApiError>,
    {
        let mut scope = Scope::enter(self, control)?;
        match callback() {
            Ok(value) => {
                scope.commit()?;
                Ok(value)
            }
            Err(e) => {
                scope.rollback_after(&e);
                Err(e)
            }
        }
    }

    /// Commit iff `callback` returns `true`; `false` or an error rolls back.
    /// Returns what the callback decided.
    pub fn wrap_bool<F>(&self, control: &dyn TransactionControl, callback: F) -> Result<bool, ApiError>
    where
        F: FnOnce() -> Result<bool, ApiError>,
    {
        let mut scope = Scope::enter(self, control)?;
        match callback() {
            Ok(true) => {
                scope.commit()?;
                Ok(true)
            }
            Ok(false) => {
                scope.rollback()?;
                Ok(false)
            }
            Err(e) => {
                scope.rollback_after(&e);
                Err(e)
            }
        }
    }
}

/// One level of nesting. Dropping an unfinished opener scope (a panic in the
/// callback) rolls the physical transaction back.
struct Scope<'a> {
    coordinator: &'a TransactionCoordinator,
    control: &'a dyn TransactionControl,
    opener: bool,
    finished: bool,
}

impl<'a> Scope<'a> {
    fn enter(coordinator: &'a TransactionCoordinator, control: &'a dyn TransactionControl) -> Result<Self, ApiError> {
        let opener = coordinator.depth.load(Ordering::SeqCst) == 0;
        if opener {
            control.begin()?;
            trace!("transaction opened");
        } else {
            trace!(depth = coordinator.depth(), "joining open transaction");
        }
        coordinator.depth.fetch_add(1, Ordering::SeqCst);
        Ok(Self { coordinator, control, opener, finished: false })
    }

    fn commit(&mut self) -> Result<(), ApiError> {
        self.finished = true;
        if self.opener {
            self.leave();
            if let Err(e) = self.control.commit() {
                warn!("commit failed, rolling back: {e}");
                let _ = self.control.rollback();
                return Err(e);
            }
            trace!("transaction committed");
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ApiError> {
        self.finished = true;
        if self.opener {
            self.leave();
            self.control.rollback()?;
            trace!("transaction rolled back");
        }
        Ok(())
    }

    /// Roll back after `cause` failed the callback. A rollback failure is
    /// logged so that `cause` reaches the caller.
    fn rollback_after(&mut self, cause: &ApiError) {
        if let Err(e) = self.rollback() {
            warn!("rollback failed after {cause}: {e}");
        }
    }

    fn leave(&self) {
        self.coordinator.depth.store(0, Ordering::SeqCst);
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        if self.opener {
            if !self.finished {
                warn!("transaction scope abandoned, rolling back");
                self.leave();
                let _ = self.control.rollback();
            }
        } else {
            self.coordinator.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
