//! §6 object-store port: reads a flow's generated package descriptor.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub trait DescriptorStore: Send + Sync {
    fn get_descriptor(&self, flow_id: &str) -> Option<Value>;
}

/// In-memory stub keyed by flow id, standing in for `PKGSTORE_BUCKET`.
#[derive(Default)]
pub struct InMemoryDescriptorStore {
    docs: Mutex<HashMap<String, Value>>,
}

impl InMemoryDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, flow_id: impl Into<String>, descriptor: Value) {
        self.docs.lock().unwrap_or_else(|e| e.into_inner()).insert(flow_id.into(), descriptor);
    }
}

impl DescriptorStore for InMemoryDescriptorStore {
    fn get_descriptor(&self, flow_id: &str) -> Option<Value> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner()).get(flow_id).cloned()
    }
}
