//! Deadline-bounded lock acquisition
//!
//! Store locks MUST have a timeout: a writer that cannot get a node's lock
//! in time fails with a retryable `Timeout` rather than queueing forever.
//! Contention past half the deadline is logged once per acquisition.

use std::sync::{
    Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError, TryLockResult,
};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{EngineError, Result};

/// Spins before the first sleep.
const SPIN_ATTEMPTS: u32 = 64;

/// Sleep between attempts once spinning is exhausted.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    resource: &str,
    timeout: Duration,
) -> Result<MutexGuard<'a, T>> {
    acquire(resource, timeout, || mutex.try_lock())
}

pub fn read<'a, T>(
    lock: &'a RwLock<T>,
    resource: &str,
    timeout: Duration,
) -> Result<RwLockReadGuard<'a, T>> {
    acquire(resource, timeout, || lock.try_read())
}

pub fn write<'a, T>(
    lock: &'a RwLock<T>,
    resource: &str,
    timeout: Duration,
) -> Result<RwLockWriteGuard<'a, T>> {
    acquire(resource, timeout, || lock.try_write())
}

fn acquire<G>(
    resource: &str,
    timeout: Duration,
    mut try_acquire: impl FnMut() -> TryLockResult<G>,
) -> Result<G> {
    let start = Instant::now();
    let mut attempts: u32 = 0;
    let mut warned = false;

    loop {
        match try_acquire() {
            Ok(guard) => {
                if warned {
                    tracing::debug!(
                        resource,
                        waited_ms = start.elapsed().as_millis() as u64,
                        "lock acquired after contention"
                    );
                }
                return Ok(guard);
            }
            Err(TryLockError::WouldBlock) => {}
            Err(TryLockError::Poisoned(_)) => {
                return Err(EngineError::Poisoned {
                    resource: resource.to_string(),
                })
            }
        }

        let waited = start.elapsed();
        if waited >= timeout {
            tracing::warn!(resource, waited_ms = waited.as_millis() as u64, "lock timeout");
            return Err(EngineError::Timeout {
                resource: resource.to_string(),
                waited,
            });
        }
        if !warned && waited > timeout / 2 {
            tracing::warn!(resource, "lock contention, waiting");
            warned = true;
        }

        attempts += 1;
        if attempts < SPIN_ATTEMPTS {
            thread::yield_now();
        } else {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_uncontended_lock() {
        let mutex = Mutex::new(1);
        let guard = lock(&mutex, "test", Duration::from_millis(10)).unwrap();
        assert_eq!(*guard, 1);
    }

    #[test]
    fn test_lock_timeout() {
        let mutex = Mutex::new(());
        let _held = mutex.lock().unwrap();

        let err = lock(&mutex, "node team-a", Duration::from_millis(20)).unwrap_err();
        assert!(err.is_retryable());
        match err {
            EngineError::Timeout { resource, waited } => {
                assert_eq!(resource, "node team-a");
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_readers_share_writer_waits() {
        let rw = RwLock::new(0);
        let r1 = read(&rw, "tree", Duration::from_millis(10)).unwrap();
        let r2 = read(&rw, "tree", Duration::from_millis(10)).unwrap();
        assert_eq!(*r1 + *r2, 0);

        assert!(write(&rw, "tree", Duration::from_millis(10)).is_err());
        drop(r1);
        drop(r2);
        *write(&rw, "tree", Duration::from_millis(10)).unwrap() = 5;
        assert_eq!(*read(&rw, "tree", Duration::from_millis(10)).unwrap(), 5);
    }

    #[test]
    fn test_poisoned_lock_is_not_retryable() {
        let mutex = Arc::new(Mutex::new(()));
        let poisoner = Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err = lock(&mutex, "journal", Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, EngineError::Poisoned { .. }));
        assert!(!err.is_retryable());
    }
}
