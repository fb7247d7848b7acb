use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::remote::RemoteStore;

struct Pending {
    generation: u64,
    value: serde_json::Value,
}

#[derive(Default)]
struct QueueState {
    pending: HashMap<String, Pending>,
    in_flight: usize,
    next_generation: u64,
}

/// Debounced remote writer. Each key keeps only its latest value; a write
/// goes out once the key has been quiet for the debounce window.
#[derive(Clone)]
pub struct SyncQueue {
    remote: Arc<dyn RemoteStore>,
    window: Duration,
    state: Arc<Mutex<QueueState>>,
}

impl SyncQueue {
    pub fn new(remote: Arc<dyn RemoteStore>, window: Duration) -> Self {
        SyncQueue {
            remote,
            window,
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues `value` for `key`, replacing anything still waiting for it
    pub fn enqueue(&self, key: &str, value: serde_json::Value) {
        if !self.remote.is_configured() {
            return;
        }
        let generation = {
            let mut state = self.lock();
            state.next_generation += 1;
            let generation = state.next_generation;
            state.pending.insert(key.to_string(), Pending { generation, value });
            generation
        };

        // Without a runtime the write waits for the next flush
        let Ok(handle) = Handle::try_current() else {
            debug!(key, "No async runtime, write held until flush");
            return;
        };
        let queue = self.clone();
        let key = key.to_string();
        handle.spawn(async move {
            tokio::time::sleep(queue.window).await;
            queue.fire(&key, generation).await;
        });
    }

    async fn fire(&self, key: &str, generation: u64) {
        let value = {
            let mut state = self.lock();
            // superseded or already flushed
            if state.pending.get(key).map(|p| p.generation) != Some(generation) {
                return;
            }
            let Some(pending) = state.pending.remove(key) else {
                return;
            };
            state.in_flight += 1;
            pending.value
        };
        self.send(key, &value).await;
    }

    async fn send(&self, key: &str, value: &serde_json::Value) {
        if let Err(e) = self.remote.save(key, value).await {
            warn!(key, error = %e, "Remote write failed, local copy kept");
        }
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Drops the queued write for `key`, if any. Its timer then finds
    /// nothing to send.
    pub fn discard(&self, key: &str) {
        if self.lock().pending.remove(key).is_some() {
            debug!(key, "Dropped queued remote write");
        }
    }

    /// Queued plus in-flight writes
    pub fn pending_writes(&self) -> usize {
        let state = self.lock();
        state.pending.len() + state.in_flight
    }

    /// Sends everything queued right away
    pub async fn flush(&self) {
        let drained: Vec<(String, serde_json::Value)> = {
            let mut state = self.lock();
            let drained: Vec<_> = state.pending.drain().map(|(k, p)| (k, p.value)).collect();
            state.in_flight += drained.len();
            drained
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "Flushing queued remote writes");
        }
        for (key, value) in drained {
            self.send(&key, &value).await;
        }
    }
}
