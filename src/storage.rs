// src/storage.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::Rng;

/// Stand-in for a real object store. Keys and URLs are synthesized; nothing
/// leaves process memory.
#[derive(Clone, Default)]
pub struct FileStorage {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

impl FileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(&self, file_name: &str, folder: &str) -> StoredObject {
        let suffix: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let key = format!("{folder}/{suffix}-{file_name}");
        let object = StoredObject {
            url: format!("https://storage.portal.local/{key}"),
            key,
        };
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(object.key.clone(), object.clone());
        object
    }

    pub fn get_url(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .map(|o| o.url.clone())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(key)
            .is_some()
    }
}
