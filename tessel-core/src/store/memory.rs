use super::ConfigStore;
use crate::{ConfigKey, EncodedValue, Result, TesselError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-process store for single-instance deployments and tests.
///
/// Several service instances may share one `MemoryConfigStore` through an
/// `Arc` to stand in for a shared network store.
#[derive(Default)]
pub struct MemoryConfigStore {
    entries: RwLock<BTreeMap<ConfigKey, EncodedValue>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TesselError::Store("memory store is unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &ConfigKey) -> Result<Option<EncodedValue>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &ConfigKey, value: &EncodedValue) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.entries.write().await.insert(key.clone(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &ConfigKey) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<String>> {
        self.check_available()?;
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|key| key.namespace() == namespace)
            .map(|key| key.path().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueFormat;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryConfigStore::new();
        let key = ConfigKey::new("tenant-a", "b").unwrap();
        let value = EncodedValue::new("1", ValueFormat::Json, "test", 1);

        assert!(store.get(&key).await.unwrap().is_none());
        store.put(&key, &value).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(value));

        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
        assert_eq!(store.get_count(), 3);
        assert_eq!(store.delete_count(), 2);
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_sorted() {
        let store = MemoryConfigStore::new();
        let value = EncodedValue::new("1", ValueFormat::Json, "test", 1);
        for (namespace, path) in [("a", "z"), ("a", "m"), ("b", "x")] {
            let key = ConfigKey::new(namespace, path).unwrap();
            store.put(&key, &value).await.unwrap();
        }

        assert_eq!(store.list("a").await.unwrap(), vec!["m", "z"]);
        assert_eq!(store.list("b").await.unwrap(), vec!["x"]);
        assert!(store.list("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryConfigStore::new();
        let key = ConfigKey::new("a", "b").unwrap();
        store.set_unavailable(true);

        let err = store.get(&key).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.delete(&key).await.is_err());
    }
}
