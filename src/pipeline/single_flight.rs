//! Per-(candidate, role) exclusion so concurrent misses call the model once

use crate::analysis::Role;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Key = (String, Role);

/// Registry of async locks keyed by candidate and role.
///
/// Guards are owned, so an aborted task releases its lock when the task is
/// dropped.
#[derive(Debug, Default)]
pub struct SingleFlight {
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, candidate_id: &str, role: Role) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on can go
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((candidate_id.to_string(), role))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    /// Keys currently held or awaited
    pub fn in_use(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let flights = Arc::new(SingleFlight::new());
        let guard = flights.acquire("c1", Role::Security).await;

        let waiter = {
            let flights = flights.clone();
            tokio::spawn(async move {
                let _g = flights.acquire("c1", Role::Security).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let flights = SingleFlight::new();
        let _a = flights.acquire("c1", Role::Security).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(50),
            flights.acquire("c1", Role::Quality),
        )
        .await
        .unwrap();
        let _c = tokio::time::timeout(
            Duration::from_millis(50),
            flights.acquire("c2", Role::Security),
        )
        .await
        .unwrap();
        assert_eq!(flights.in_use(), 3);
    }

    #[tokio::test]
    async fn test_aborted_holder_releases_lock() {
        let flights = Arc::new(SingleFlight::new());
        let holder = {
            let flights = flights.clone();
            tokio::spawn(async move {
                let _g = flights.acquire("c1", Role::Architecture).await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        holder.abort();
        let _ = holder.await;

        tokio::time::timeout(
            Duration::from_millis(100),
            flights.acquire("c1", Role::Architecture),
        )
        .await
        .unwrap();
    }
}
