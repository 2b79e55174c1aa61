//! §4.G / §6 search indexer port: the dataset-catalog document sink.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct DatasetDocument {
    pub id: String,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub certified: bool,
    pub datapackage: Value,
    pub datahub: Value,
}

/// Recursively walks a JSON value so the index only ever sees the
/// plain object/array/string/number/bool/null shapes a document store
/// expects — a no-op today since `serde_json::Value` has no richer
/// variants to flatten, but it's the hook a real mapping step would
/// extend (§4.G).
pub fn normalize_for_index(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), normalize_for_index(v))).collect()),
        Value::Array(items) => Value::Array(items.iter().map(normalize_for_index).collect()),
        other => other.clone(),
    }
}

pub trait SearchIndexer: Send + Sync {
    fn index(&self, doc: DatasetDocument);
}

/// In-memory stub keyed by dataset id, standing in for the real search
/// cluster behind `EVENTS_ELASTICSEARCH_HOST`/`DATASETS_INDEX_NAME`.
#[derive(Default)]
pub struct InMemorySearchIndexer {
    docs: Mutex<HashMap<String, DatasetDocument>>,
}

impl InMemorySearchIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<DatasetDocument> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }
}

impl SearchIndexer for InMemorySearchIndexer {
    fn index(&self, doc: DatasetDocument) {
        self.docs.lock().unwrap_or_else(|e| e.into_inner()).insert(doc.id.clone(), doc);
    }
}
