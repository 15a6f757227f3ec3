//! Reentrant read/write locking for shared objects
//!
//! Every [`crate::object::SharedLogObject`] owns one [`ReentrantRwLock`]
//! guarding its sequence number and domain state. The runtime holds the
//! write half across an entire replay or update, and object methods may
//! reacquire either half from the same thread without deadlocking.
//!
//! Semantics:
//!
//! - any number of concurrent readers, exclusive writer
//! - the write holder may reacquire the write lock (nested guards)
//! - the write holder may acquire the read lock, and keeping that read
//!   guard across the final write release downgrades the lock
//! - a thread holding only a read guard must not request the write lock;
//!   upgrading is not supported and will deadlock
//!
//! Guards are RAII and must be dropped on the acquiring thread; they are
//! intentionally not `Send`.

use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct LockState {
    writer: Option<ThreadId>,
    write_depth: usize,
    readers: usize,
}

/// Reentrant read/write lock.
#[derive(Debug)]
pub struct ReentrantRwLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl ReentrantRwLock {
    /// Creates an unlocked lock.
    pub fn new() -> ReentrantRwLock {
        ReentrantRwLock {
            state: Mutex::new(LockState {
                writer: None,
                write_depth: 0,
                readers: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Acquires the read lock, blocking while another thread writes.
    pub fn read(&self) -> ReadGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while state.writer.is_some() && state.writer != Some(me) {
            self.changed.wait(&mut state);
        }
        state.readers += 1;
        ReadGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquires the write lock, blocking while readers or another writer
    /// hold the lock. Reentrant for the current write holder.
    pub fn write(&self) -> WriteGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            if state.writer == Some(me) {
                state.write_depth += 1;
                break;
            }
            if state.writer.is_none() && state.readers == 0 {
                state.writer = Some(me);
                state.write_depth = 1;
                break;
            }
            self.changed.wait(&mut state);
        }
        WriteGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    fn release_read(&self) {
        let mut state = self.state.lock();
        state.readers -= 1;
        if state.readers == 0 {
            self.changed.notify_all();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        state.write_depth -= 1;
        if state.write_depth == 0 {
            state.writer = None;
            self.changed.notify_all();
        }
    }
}

impl Default for ReentrantRwLock {
    fn default() -> ReentrantRwLock {
        ReentrantRwLock::new()
    }
}

/// RAII guard for shared access.
#[must_use = "the lock is held only while the guard lives"]
pub struct ReadGuard<'a> {
    lock: &'a ReentrantRwLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// RAII guard for exclusive access.
#[must_use = "the lock is held only while the guard lives"]
pub struct WriteGuard<'a> {
    lock: &'a ReentrantRwLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}
