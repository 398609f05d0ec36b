use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::wire::PackResponse;

/// Keeps packing results by fabric id. The packing core never touches it;
/// callers decide what to keep.
pub trait ResultStore: Send + Sync {
    fn save(&self, fabric_id: &str, response: PackResponse);
    fn load(&self, fabric_id: &str) -> Option<PackResponse>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    results: RwLock<HashMap<String, PackResponse>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryStore {
    fn save(&self, fabric_id: &str, response: PackResponse) {
        self.results
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fabric_id.to_string(), response);
    }

    fn load(&self, fabric_id: &str) -> Option<PackResponse> {
        self.results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fabric_id)
            .cloned()
    }
}
