pub mod local;
pub mod remote;
pub mod sync;

use std::sync::Arc;

use tracing::warn;

use crate::documents::{decode, Document, DocumentKey};
use crate::error::AppError;

pub use local::{FileStore, LocalStore, MemoryStore};
pub use remote::{RemoteStore, SheetEndpoint};
pub use sync::SyncQueue;

/// Reads and writes documents locally right away and mirrors writes to the
/// remote store through the debounced queue
pub struct PersistenceGateway {
    local: Box<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    sync: SyncQueue,
}

impl PersistenceGateway {
    pub fn new(local: Box<dyn LocalStore>, remote: Arc<dyn RemoteStore>, window: std::time::Duration) -> Self {
        let sync = SyncQueue::new(remote.clone(), window);
        PersistenceGateway { local, remote, sync }
    }

    pub fn get(&self, key: DocumentKey) -> Result<Option<serde_json::Value>, AppError> {
        self.local.get(key.as_str())
    }

    pub fn set(&self, key: DocumentKey, value: serde_json::Value) -> Result<(), AppError> {
        self.local.set(key.as_str(), &value)?;
        self.sync.enqueue(key.as_str(), value);
        Ok(())
    }

    /// Loads a document, falling back to its default when absent or unreadable
    pub fn load<D: Document>(&self) -> D {
        match self.get(D::KEY) {
            Ok(value) => decode(value),
            Err(e) => {
                warn!(key = %D::KEY, error = %e, "Could not read local document");
                D::default()
            }
        }
    }

    pub fn store<D: Document>(&self, doc: &D) -> Result<(), AppError> {
        self.set(D::KEY, serde_json::to_value(doc)?)
    }

    /// Local write with no remote echo, for documents that came from the
    /// remote. Any older value still queued for that key is dropped.
    pub fn store_local<D: Document>(&self, doc: &D) -> Result<(), AppError> {
        self.local.set(D::KEY.as_str(), &serde_json::to_value(doc)?)?;
        self.sync.discard(D::KEY.as_str());
        Ok(())
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    pub fn sync_queue(&self) -> SyncQueue {
        self.sync.clone()
    }

    pub fn is_remote_configured(&self) -> bool {
        self.remote.is_configured()
    }

    pub fn pending_writes(&self) -> usize {
        self.sync.pending_writes()
    }
}

#[cfg(test)]
mod tests {
    use super::sync::tests::FakeRemote;
    use super::*;
    use crate::documents::AppSettings;
    use crate::schedule::{AssignmentMap, Day, SlotKey};
    use std::time::Duration;

    fn gateway(remote: Arc<FakeRemote>) -> PersistenceGateway {
        PersistenceGateway::new(Box::new(MemoryStore::new()), remote, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn store_writes_locally_then_remotely() {
        let remote = Arc::new(FakeRemote::configured());
        let gw = gateway(remote.clone());

        let mut map = AssignmentMap::new();
        map.assign(SlotKey::new(Day::Selasa, 2, "VIII C".parse().unwrap()), "IPS-1");
        gw.store(&map).unwrap();

        assert_eq!(gw.load::<AssignmentMap>(), map);
        assert!(remote.writes().is_empty());
        assert_eq!(gw.pending_writes(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(remote.writes()[0].0, "scheduleMap");
    }

    #[tokio::test(start_paused = true)]
    async fn local_only_store_skips_the_remote() {
        let remote = Arc::new(FakeRemote::configured());
        let gw = gateway(remote.clone());
        gw.store_local(&AppSettings::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(remote.writes().is_empty());
        assert_eq!(gw.pending_writes(), 0);
    }

    #[test]
    fn missing_documents_load_as_default() {
        let gw = gateway(Arc::new(FakeRemote::default()));
        assert_eq!(gw.load::<AppSettings>(), AppSettings::default());
        assert!(!gw.is_remote_configured());
    }
}
