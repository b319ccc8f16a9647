//! State Locker
//!
//! Per-login gate between writers of authoritative account data and the
//! readers that would otherwise observe a half-refreshed cache.
//!
//! A login with a mutation in flight maps to the list of parked waiters.
//! [`StateLocker::ready_to_read`] returns at once when nothing is in flight
//! and otherwise parks until the writer's guard is dropped; dropping the
//! guard signals every waiter exactly once and discards the list. Writers
//! on the same login queue on the same list and retry after the wake-up.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

type Waiters = HashMap<String, Vec<oneshot::Sender<()>>>;

#[derive(Debug, Default)]
pub struct StateLocker {
    in_flight: Mutex<Waiters>,
}

/// Exclusive hold on one login; unlocks on drop
#[must_use = "the login is unlocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct StateGuard<'a> {
    locker: &'a StateLocker,
    key: String,
}

impl StateLocker {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_flight(&self) -> MutexGuard<'_, Waiters> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin a mutation on `key`, waiting for any mutation already in flight
    pub async fn lock(&self, key: &str) -> StateGuard<'_> {
        loop {
            let wake = {
                let mut in_flight = self.in_flight();
                match in_flight.get_mut(key) {
                    None => {
                        in_flight.insert(key.to_owned(), Vec::new());
                        return StateGuard {
                            locker: self,
                            key: key.to_owned(),
                        };
                    }
                    Some(waiters) => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(tx);
                        rx
                    }
                }
            };
            // A dropped sender also means the holder is gone
            let _ = wake.await;
        }
    }

    /// Wait until no mutation on `key` is in flight
    pub async fn ready_to_read(&self, key: &str) {
        let wake = {
            let mut in_flight = self.in_flight();
            match in_flight.get_mut(key) {
                None => return,
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    rx
                }
            }
        };
        let _ = wake.await;
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.in_flight().contains_key(key)
    }

    fn unlock(&self, key: &str) {
        let waiters = self.in_flight().remove(key).unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

impl StateGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.locker.unlock(&self.key);
    }
}
