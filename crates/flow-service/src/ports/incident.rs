//! §4.G incident reporter port: `(title, owner, errors)`.

use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Incident {
    pub title: String,
    pub owner: String,
    pub errors: Value,
}

pub trait IncidentReporter: Send + Sync {
    fn report(&self, incident: Incident);
}

/// In-memory stub: accumulates incidents for tests to inspect.
#[derive(Default)]
pub struct VecIncidentReporter {
    incidents: Mutex<Vec<Incident>>,
}

impl VecIncidentReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl IncidentReporter for VecIncidentReporter {
    fn report(&self, incident: Incident) {
        self.incidents.lock().unwrap_or_else(|e| e.into_inner()).push(incident);
    }
}
