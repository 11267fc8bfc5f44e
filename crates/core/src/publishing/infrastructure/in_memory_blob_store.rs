use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::publishing::domain::blob_store::{BlobStore, BlobStoreError};

#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    /// Remaining successful puts before every put fails.
    fail_after: Option<usize>,
}

/// Process-local [`BlobStore`] for tests and offline runs.
#[derive(Default)]
pub struct InMemoryBlobStore {
    state: Mutex<State>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` more puts, then reject all further puts with an error.
    pub fn fail_after(&self, n: usize) {
        self.lock().fail_after = Some(n);
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread must not hide the store from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BlobStoreError> {
        let mut state = self.lock();
        if let Some(remaining) = state.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(BlobStoreError {
                    key: key.to_string(),
                    message: "simulated network error".to_string(),
                });
            }
            *remaining -= 1;
        }
        state.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
