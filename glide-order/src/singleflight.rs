//! Per-key request coalescing: the first caller for a key runs the load,
//! concurrent callers for the same key await the same result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::broadcast;

/// Coalescing group keyed by string. `V` is cloned to every waiter.
pub struct Group<V> {
    calls: Mutex<HashMap<String, broadcast::Sender<V>>>,
}

impl<V> Default for Group<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Group<V>
where
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `load` for `key`, unless a call for the same key is already in
    /// flight, in which case the in-flight result is awaited instead. If
    /// the leader is cancelled before publishing, waiters fall back to
    /// running the load themselves.
    pub async fn run<F, Fut>(&self, key: &str, load: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let lead = {
            let mut calls = self.calls.lock().expect("singleflight lock poisoned");
            match calls.get(key) {
                Some(tx) => Err(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    calls.insert(key.to_string(), tx.clone());
                    Ok(tx)
                }
            }
        };

        match lead {
            Ok(tx) => {
                // unregister on all exits, including cancellation
                let guard = Unregister {
                    calls: &self.calls,
                    key,
                };
                let value = load().await;
                // remove the key before publishing so late arrivals start a
                // fresh call instead of subscribing to a spent channel
                drop(guard);
                let _ = tx.send(value.clone());
                value
            }
            Err(mut rx) => match rx.recv().await {
                Ok(value) => value,
                Err(_) => load().await,
            },
        }
    }
}

struct Unregister<'a, V> {
    calls: &'a Mutex<HashMap<String, broadcast::Sender<V>>>,
    key: &'a str,
}

impl<V> Drop for Unregister<'_, V> {
    fn drop(&mut self) {
        self.calls
            .lock()
            .expect("singleflight lock poisoned")
            .remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let group = Arc::new(Group::<u32>::new());
        let loads = Arc::new(AtomicU32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let group = group.clone();
            let loads = loads.clone();
            tasks.push(tokio::spawn(async move {
                group
                    .run("order-1", || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        42
                    })
                    .await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap(), 42);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let group = Arc::new(Group::<u32>::new());
        let loads = Arc::new(AtomicU32::new(0));

        let a = {
            let (group, loads) = (group.clone(), loads.clone());
            tokio::spawn(async move {
                group
                    .run("a", || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        1
                    })
                    .await
            })
        };
        let b = {
            let (group, loads) = (group.clone(), loads.clone());
            tokio::spawn(async move {
                group
                    .run("b", || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        2
                    })
                    .await
            })
        };

        assert_eq!(a.await.unwrap(), 1);
        assert_eq!(b.await.unwrap(), 2);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn key_is_reusable_after_completion() {
        let group = Group::<u32>::new();
        let loads = AtomicU32::new(0);
        let loads = &loads;

        for expected in 1..=3 {
            let got = group
                .run("same", || async move {
                    loads.fetch_add(1, Ordering::SeqCst)
                })
                .await;
            assert_eq!(got + 1, expected);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_leader_does_not_wedge_waiters() {
        let group = Arc::new(Group::<u32>::new());

        let leader = {
            let group = group.clone();
            tokio::spawn(async move {
                group
                    .run("k", || async move {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        1
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = {
            let group = group.clone();
            tokio::spawn(async move { group.run("k", || async move { 2 }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        assert_eq!(waiter.await.unwrap(), 2);
    }
}
