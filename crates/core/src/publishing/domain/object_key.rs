//! Storage key generation.
//!
//! Keys combine a millisecond timestamp with a random suffix, so concurrent
//! requests never need to coordinate with each other or with the store.

/// Hex characters of randomness appended to every key.
pub const SUFFIX_LEN: usize = 8;

#[derive(Clone, Debug)]
pub struct ObjectKeyGenerator {
    folder: String,
}

impl ObjectKeyGenerator {
    /// Leading and trailing `/` are stripped from `folder`; an empty folder
    /// produces keys at the bucket root.
    pub fn new(folder: &str) -> Self {
        Self {
            folder: folder.trim_matches('/').to_string(),
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// A fresh key ending in `.{extension}`.
    pub fn generate(&self, extension: &str) -> String {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        build_key(&self.folder, timestamp_ms, &uuid[..SUFFIX_LEN], extension)
    }
}

/// `{folder}/{ts}-face_{ts}_{suffix}.{ext}`, or without the folder prefix.
fn build_key(folder: &str, timestamp_ms: i64, suffix: &str, extension: &str) -> String {
    let file_name = format!("face_{timestamp_ms}_{suffix}.{extension}");
    if folder.is_empty() {
        format!("{timestamp_ms}-{file_name}")
    } else {
        format!("{folder}/{timestamp_ms}-{file_name}")
    }
}
