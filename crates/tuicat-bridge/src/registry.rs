use crate::connector::RemoteSession;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Server-side record of one live connection.
pub struct ConnectionRecord {
    id: String,
    session: Arc<dyn RemoteSession>,
    released: AtomicBool,
}

impl ConnectionRecord {
    pub fn new(id: String, session: Arc<dyn RemoteSession>) -> Self {
        Self {
            id,
            session,
            released: AtomicBool::new(false),
        }
    }

    /// Removes the record and ends its session. Only the first caller does
    /// the work; every later call returns `false`.
    pub async fn release(&self, registry: &ConnectionRegistry) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        registry.remove(&self.id);
        self.session.end().await;
        info!(connection_id = %self.id, "connection released");
        true
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<ConnectionRecord>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: Arc<ConnectionRecord>) {
        self.inner.lock().insert(record.id.clone(), record);
    }

    /// Removing an absent id is not an error.
    pub fn remove(&self, id: &str) -> Option<Arc<ConnectionRecord>> {
        self.inner.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingSession {
        ends: AtomicUsize,
    }

    #[async_trait]
    impl RemoteSession for CountingSession {
        async fn end(&self) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn record(registry: &ConnectionRegistry) -> (Arc<ConnectionRecord>, Arc<CountingSession>) {
        let session = Arc::new(CountingSession::default());
        let record = Arc::new(ConnectionRecord::new("c1".into(), session.clone()));
        registry.insert(record.clone());
        (record, session)
    }

    #[tokio::test]
    async fn repeated_release_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        let (record, session) = record(&registry);
        assert!(record.release(&registry).await);
        assert!(!record.release(&registry).await);
        assert!(!record.release(&registry).await);
        assert!(registry.is_empty());
        assert_eq!(session.ends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_triggers_release_once() {
        let registry = ConnectionRegistry::new();
        let (record, session) = record(&registry);
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let record = record.clone();
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move { record.release(&registry).await }));
        }
        let mut released = 0;
        for task in tasks {
            if task.await.unwrap() {
                released += 1;
            }
        }
        assert_eq!(released, 1);
        assert_eq!(session.ends.load(Ordering::SeqCst), 1);
        assert!(record.released.load(Ordering::SeqCst));
        assert!(registry.is_empty());
    }

    #[test]
    fn removing_unknown_id_is_fine() {
        let registry = ConnectionRegistry::new();
        assert!(registry.remove("missing").is_none());
        assert_eq!(registry.len(), 0);
    }
}
