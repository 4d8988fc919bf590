use super::with_deadline;
use crate::key::normalize_namespace;
use crate::{ConfigStore, Result};
use std::sync::Arc;
use std::time::Duration;

/// Lists paths in a namespace straight from the backing store.
#[derive(Clone)]
pub struct ListConfigOperation {
    store: Arc<dyn ConfigStore>,
    store_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ListConfigOperationRequest {
    pub namespace: String,
    pub timeout: Option<Duration>,
}

impl ListConfigOperation {
    pub fn new(store: Arc<dyn ConfigStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub async fn run(&self, request: ListConfigOperationRequest) -> Result<Vec<String>> {
        let namespace = normalize_namespace(&request.namespace)?;
        let deadline = request.timeout.unwrap_or(self.store_timeout);
        with_deadline(deadline, "store list", self.store.list(&namespace)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigKey, EncodedValue, MemoryConfigStore, ValueFormat};

    #[tokio::test]
    async fn test_list_defaults_namespace() {
        let store = Arc::new(MemoryConfigStore::new());
        let value = EncodedValue::new("1", ValueFormat::Json, "cli", 1);
        store
            .put(&ConfigKey::in_default_namespace("b").unwrap(), &value)
            .await
            .unwrap();
        store
            .put(&ConfigKey::in_default_namespace("a").unwrap(), &value)
            .await
            .unwrap();

        let operation = ListConfigOperation::new(store, Duration::from_secs(1));
        let paths = operation
            .run(ListConfigOperationRequest {
                namespace: String::new(),
                timeout: None,
            })
            .await
            .unwrap();
        assert_eq!(paths, vec!["a", "b"]);
    }
}
