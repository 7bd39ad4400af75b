//! Shared state for the development server.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::dev::DevEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    NotStarted,
    InProgress { started_at: Instant },
    Success { duration_ms: u64 },
    /// The last build failed; the cache still holds the last good output.
    Failed {
        errors: Vec<String>,
        overlay: Option<String>,
    },
}

impl BuildStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, BuildStatus::InProgress { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success { .. })
    }

    /// Overlay HTML to serve instead of the document, if any.
    pub fn overlay(&self) -> Option<&str> {
        match self {
            BuildStatus::Failed { overlay, .. } => overlay.as_deref(),
            _ => None,
        }
    }

    /// The event a newly connected client should see first.
    pub fn as_event(&self) -> Option<DevEvent> {
        match self {
            BuildStatus::NotStarted => None,
            BuildStatus::InProgress { .. } => Some(DevEvent::BuildStarted),
            BuildStatus::Success { duration_ms } => Some(DevEvent::BuildCompleted {
                duration_ms: *duration_ms,
            }),
            BuildStatus::Failed { errors, overlay } => Some(DevEvent::BuildFailed {
                errors: errors.clone(),
                overlay: overlay.clone(),
            }),
        }
    }
}

/// Development output keyed by URL path, e.g. `/app.js`.
#[derive(Debug, Clone, Default)]
pub struct BundleCache {
    files: HashMap<String, (Vec<u8>, String)>,
}

impl BundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: String, content: Vec<u8>, content_type: String) {
        self.files.insert(url, (content, content_type));
    }

    pub fn get(&self, url: &str) -> Option<&(Vec<u8>, String)> {
        self.files.get(url)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Connected SSE clients.
pub type ClientRegistry = Arc<RwLock<HashMap<usize, mpsc::Sender<String>>>>;

pub struct DevServerState {
    pub status: RwLock<BuildStatus>,
    pub cache: RwLock<BundleCache>,
    pub clients: ClientRegistry,
    next_client_id: RwLock<usize>,
    /// URL of the entry document, served for `/` and history fallback.
    pub document_url: String,
}

impl DevServerState {
    pub fn new(document_url: impl Into<String>) -> Self {
        Self {
            status: RwLock::new(BuildStatus::NotStarted),
            cache: RwLock::new(BundleCache::new()),
            clients: Arc::new(RwLock::new(HashMap::new())),
            next_client_id: RwLock::new(0),
            document_url: document_url.into(),
        }
    }

    pub fn start_build(&self) {
        *self.status.write() = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
    }

    /// Swap in a fresh build.
    pub fn complete_build(&self, duration_ms: u64, cache: BundleCache) {
        *self.cache.write() = cache;
        *self.status.write() = BuildStatus::Success { duration_ms };
    }

    /// Record a failure. The cache is left untouched.
    pub fn fail_build(&self, errors: Vec<String>, overlay: Option<String>) {
        *self.status.write() = BuildStatus::Failed { errors, overlay };
    }

    pub fn get_status(&self) -> BuildStatus {
        self.status.read().clone()
    }

    pub fn get_cached_file(&self, url: &str) -> Option<(Vec<u8>, String)> {
        self.cache.read().get(url).cloned()
    }

    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = {
            let mut next_id = self.next_client_id.write();
            let id = *next_id;
            *next_id += 1;
            id
        };

        let (tx, rx) = mpsc::channel(100);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    /// Send `event` to every client, dropping the ones that went away.
    pub async fn broadcast(&self, event: &DevEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(%err, "failed to encode live update");
                return;
            }
        };

        let clients = self.clients.read().clone();
        let mut gone = Vec::new();
        for (id, tx) in clients {
            if tx.send(json.clone()).await.is_err() {
                gone.push(id);
            }
        }
        for id in gone {
            self.unregister_client(id);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

pub type SharedState = Arc<DevServerState>;
