use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use diskforge_core::DriveLetter;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Key of a per-target operation lock: the disk number when one is
/// known, otherwise the letter the request addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Disk(u32),
    Letter(DriveLetter),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Disk(number) => write!(f, "disk {}", number),
            LockKey::Letter(letter) => write!(f, "volume {}", letter),
        }
    }
}

/// Registry of per-target mutexes. Every mutating operation holds its
/// target's lock for its full duration, so destructive commands never
/// interleave on one disk while unrelated disks proceed in parallel.
/// Entries are never removed; the key space is small.
#[derive(Default)]
pub struct OpLocks {
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl OpLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key).or_default())
        };
        log::trace!("acquiring lock for {}", key);
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn hold(
        locks: Arc<OpLocks>,
        key: LockKey,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) {
        let _guard = locks.acquire(key).await;
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        active.fetch_sub(1, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(OpLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let a = tokio::spawn(hold(
            Arc::clone(&locks),
            LockKey::Disk(5),
            Arc::clone(&active),
            Arc::clone(&peak),
        ));
        let b = tokio::spawn(hold(
            Arc::clone(&locks),
            LockKey::Disk(5),
            Arc::clone(&active),
            Arc::clone(&peak),
        ));
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_in_parallel() {
        let locks = Arc::new(OpLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let a = tokio::spawn(hold(
            Arc::clone(&locks),
            LockKey::Disk(5),
            Arc::clone(&active),
            Arc::clone(&peak),
        ));
        let b = tokio::spawn(hold(
            Arc::clone(&locks),
            LockKey::Disk(6),
            Arc::clone(&active),
            Arc::clone(&peak),
        ));
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disk_and_letter_keys_are_distinct() {
        let locks = OpLocks::new();
        let letter = DriveLetter::parse("E").unwrap();
        let _disk = locks.acquire(LockKey::Disk(1)).await;
        // must not deadlock: a letter key is a different lock
        let _letter = locks.acquire(LockKey::Letter(letter)).await;
    }
}
