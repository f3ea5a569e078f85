use meteo_protocol::DistributionMessage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Most recent broadcast per station id. Each entry is replaced whole.
#[derive(Clone, Default)]
pub struct LatestReadings {
    inner: Shared<HashMap<String, DistributionMessage>>,
}

impl LatestReadings {
    pub fn new() -> Self {
        Self {
            inner: new_state(HashMap::new()),
        }
    }

    /// Stores `msg`, returning the entry it replaced.
    pub fn update(&self, msg: DistributionMessage) -> Option<DistributionMessage> {
        self.inner.lock().insert(msg.server_id.clone(), msg)
    }

    pub fn get(&self, server_id: &str) -> Option<DistributionMessage> {
        self.inner.lock().get(server_id).cloned()
    }

    /// Copy of every entry, sorted by station id.
    pub fn snapshot(&self) -> Vec<DistributionMessage> {
        let mut all: Vec<_> = self.inner.lock().values().cloned().collect();
        all.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        all
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
