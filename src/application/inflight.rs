//! In-flight Registry - 单飞下载注册表
//!
//! 同一键同时只有一个下载在进行，后来者等待同一结果

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Slot<V> {
    generation: u64,
    receiver: watch::Receiver<Option<V>>,
}

/// 单飞注册表
pub struct InFlight<K, V> {
    entries: Arc<DashMap<K, Slot<V>>>,
    generation: AtomicU64,
}

/// `join` 的结果
pub enum Join<K: Eq + Hash, V> {
    /// 当前调用方负责执行，并通过 `Completion` 发布结果
    Leader(Completion<K, V>, Waiter<V>),
    /// 已有执行者，等待其结果
    Follower(Waiter<V>),
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// 加入某个键的执行
    pub fn join(&self, key: &K) -> Join<K, V> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(slot) => Join::Follower(Waiter {
                receiver: slot.get().receiver.clone(),
            }),
            Entry::Vacant(vacant) => {
                let (sender, receiver) = watch::channel(None);
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Slot {
                    generation,
                    receiver: receiver.clone(),
                });
                Join::Leader(
                    Completion {
                        key: key.clone(),
                        generation,
                        sender,
                        entries: self.entries.clone(),
                    },
                    Waiter { receiver },
                )
            }
        }
    }

    /// 当前进行中的键数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

impl<K, V> Default for InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// 执行者持有的完成令牌
///
/// 无论成功、失败还是被丢弃，注册表条目都恰好移除一次；
/// 未发布结果就被丢弃时，等待者得到 `None`
pub struct Completion<K: Eq + Hash, V> {
    key: K,
    generation: u64,
    sender: watch::Sender<Option<V>>,
    entries: Arc<DashMap<K, Slot<V>>>,
}

impl<K: Eq + Hash, V> Completion<K, V> {
    /// 发布结果并移除条目
    pub fn complete(self, value: V) {
        self.sender.send_replace(Some(value));
        // Drop 负责移除
    }
}

impl<K: Eq + Hash, V> Drop for Completion<K, V> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.entries
            .remove_if(&self.key, |_, slot| slot.generation == generation);
    }
}

/// 等待者
pub struct Waiter<V> {
    receiver: watch::Receiver<Option<V>>,
}

impl<V: Clone> Waiter<V> {
    /// 等待执行者发布结果；执行者中止时返回 `None`
    pub async fn wait(mut self) -> Option<V> {
        match self.receiver.wait_for(|value| value.is_some()).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_leader_per_key() {
        let registry: InFlight<String, u32> = InFlight::new();

        let first = registry.join(&"a".to_string());
        let second = registry.join(&"a".to_string());
        let other = registry.join(&"b".to_string());

        assert!(matches!(first, Join::Leader(..)));
        assert!(matches!(second, Join::Follower(_)));
        assert!(matches!(other, Join::Leader(..)));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_followers_receive_leader_result() {
        let registry: InFlight<String, u32> = InFlight::new();
        let key = "k".to_string();

        let Join::Leader(completion, leader_wait) = registry.join(&key) else {
            panic!("expected leader");
        };
        let Join::Follower(follower_wait) = registry.join(&key) else {
            panic!("expected follower");
        };

        let follower = tokio::spawn(follower_wait.wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        completion.complete(7);

        assert_eq!(leader_wait.wait().await, Some(7));
        assert_eq!(follower.await.unwrap(), Some(7));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_completion_releases_waiters() {
        let registry: InFlight<String, u32> = InFlight::new();
        let key = "k".to_string();

        let Join::Leader(completion, waiter) = registry.join(&key) else {
            panic!("expected leader");
        };
        drop(completion);

        assert_eq!(waiter.wait().await, None);
        assert!(!registry.contains(&key));
        // 下一个调用者重新成为执行者
        assert!(matches!(registry.join(&key), Join::Leader(..)));
    }
}
