//! Named event channels for downstream consumers
//!
//! The engine publishes onto a `tokio::sync::broadcast` bus. Publishing
//! never blocks and never fails the evaluation that produced the event;
//! with no subscribers the event is simply dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::balance::{BalanceSample, TelemetrySample};
use crate::debt::DebtScore;
use crate::mitigation::MitigationDecision;
use crate::pruning::QuarantineRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventChannel {
    #[serde(rename = "telemetry:update")]
    TelemetryUpdate,
    #[serde(rename = "idi:update")]
    DebtUpdate,
    #[serde(rename = "mitigation:triggered")]
    MitigationTriggered,
    #[serde(rename = "component:quarantined")]
    ComponentQuarantined,
    #[serde(rename = "component:restored")]
    ComponentRestored,
    #[serde(rename = "system:health")]
    SystemHealth,
    #[serde(rename = "balance:update")]
    BalanceUpdate,
}

impl EventChannel {
    pub const ALL: [EventChannel; 7] = [
        Self::TelemetryUpdate,
        Self::DebtUpdate,
        Self::MitigationTriggered,
        Self::ComponentQuarantined,
        Self::ComponentRestored,
        Self::SystemHealth,
        Self::BalanceUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TelemetryUpdate => "telemetry:update",
            Self::DebtUpdate => "idi:update",
            Self::MitigationTriggered => "mitigation:triggered",
            Self::ComponentQuarantined => "component:quarantined",
            Self::ComponentRestored => "component:restored",
            Self::SystemHealth => "system:health",
            Self::BalanceUpdate => "balance:update",
        }
    }
}

impl std::fmt::Display for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status across tracked components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Healthy,
    Warning,
    Critical,
    NoComponents,
}

/// Aggregate health across tracked components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: SystemStatus,
    pub total_components: usize,
    pub healthy_components: usize,
    pub warning_components: usize,
    pub quarantined_components: usize,
    pub average_health: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Telemetry { sample: TelemetrySample },
    Debt { component_id: String, score: DebtScore },
    Decision { decision: MitigationDecision },
    Quarantine { record: QuarantineRecord },
    Balance { component_id: String, sample: BalanceSample, smoothed_imbalance: f64 },
    Health { health: SystemHealth },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationEvent {
    pub channel: EventChannel,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl MitigationEvent {
    pub fn new(channel: EventChannel, payload: EventPayload) -> Self {
        Self {
            channel,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Component the event concerns, if any
    pub fn component_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Telemetry { sample } => Some(&sample.component_id),
            EventPayload::Debt { component_id, .. } => Some(component_id),
            EventPayload::Decision { decision } => Some(&decision.component_id),
            EventPayload::Quarantine { record } => Some(&record.component_id),
            EventPayload::Balance { component_id, .. } => Some(component_id),
            EventPayload::Health { .. } => None,
        }
    }
}

/// Broadcast bus for mitigation events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MitigationEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MitigationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event; returns the number of subscribers reached
    pub fn publish(&self, event: MitigationEvent) -> usize {
        match self.sender.send(event) {
            Ok(n) => n,
            Err(_) => 0,
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = MitigationEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mitigation::MitigationAction;

    #[test]
    fn test_channel_names() {
        let names: Vec<&str> = EventChannel::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "telemetry:update",
                "idi:update",
                "mitigation:triggered",
                "component:quarantined",
                "component:restored",
                "system:health",
                "balance:update",
            ]
        );
        for channel in EventChannel::ALL {
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel.as_str()));
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        let decision = MitigationDecision::new(MitigationAction::Alert, "c", "r", 1.0);
        let event = MitigationEvent::new(
            EventChannel::MitigationTriggered,
            EventPayload::Decision { decision },
        );
        assert_eq!(bus.publish(event), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let decision = MitigationDecision::new(MitigationAction::Throttle, "fpga", "r", 0.5);
        bus.publish(MitigationEvent::new(
            EventChannel::MitigationTriggered,
            EventPayload::Decision { decision },
        ));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.channel, EventChannel::MitigationTriggered);
        assert_eq!(event.component_id(), Some("fpga"));
    }
}
