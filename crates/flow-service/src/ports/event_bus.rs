//! §4.G event bus port: fixed positional-field flow-termination events.

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct FlowEvent {
    pub source: &'static str,
    pub event: String,
    pub outcome: &'static str,
    pub findability: &'static str,
    pub actor: String,
    pub dataset: String,
    pub owner: String,
    pub ownerid: String,
    pub flow_id: String,
    pub pipeline_id: Option<String>,
    pub payload: Value,
}

pub trait EventBus: Send + Sync {
    fn publish(&self, event: FlowEvent);
}

/// Channel-backed stub: publishes onto an unbounded channel so tests
/// can assert on what was emitted without a real message broker.
pub struct ChannelEventBus {
    tx: tokio::sync::mpsc::UnboundedSender<FlowEvent>,
}

impl ChannelEventBus {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<FlowEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventBus for ChannelEventBus {
    fn publish(&self, event: FlowEvent) {
        // A dropped receiver means nobody is listening; per §7
        // ("background-sink failures are logged and swallowed") this
        // must never propagate back to the reducer's caller.
        if self.tx.send(event).is_err() {
            tracing::warn!("event bus receiver dropped, event discarded");
        }
    }
}
