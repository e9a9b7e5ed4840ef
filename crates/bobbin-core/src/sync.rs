use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a bookkeeping mutex.
///
/// Guards are never held across an `.await`, and the state they protect is
/// only ever left consistent, so a poisoned lock is simply recovered.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
