//! Mitigation signal emission
//!
//! Every event published by the mitigation engine leaves the agent as a
//! `mitigation_signal`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use synapse_core::{EventChannel, EventPayload, MitigationAction, MitigationEvent};

/// Mitigation signal for downstream consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitigationSignal {
    /// Unique event identifier
    pub event_id: Uuid,

    /// Agent identifier
    pub agent_id: String,

    /// Agent version
    pub agent_version: String,

    /// Signal type (always "mitigation_signal")
    pub signal_type: String,

    /// Channel the event was published on
    pub channel: EventChannel,

    /// Hash of inputs for deduplication
    pub inputs_hash: String,

    /// Event payload
    pub payload: EventPayload,

    /// Confidence score (0.0-1.0)
    pub confidence: f64,

    /// Execution reference
    pub execution_ref: String,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Correlation IDs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub correlation_ids: HashMap<String, String>,
}

impl MitigationSignal {
    pub const AGENT_VERSION: &'static str = "0.5.0";
    pub const AGENT_ID: &'static str = "integration-health-agent";
    pub const SIGNAL_TYPE: &'static str = "mitigation_signal";

    /// Create from an engine event
    pub fn from_event(event: MitigationEvent, inputs_hash: String, execution_ref: String) -> Self {
        let confidence = Self::confidence_for(&event.payload);
        Self {
            event_id: Uuid::new_v4(),
            agent_id: Self::AGENT_ID.to_string(),
            agent_version: Self::AGENT_VERSION.to_string(),
            signal_type: Self::SIGNAL_TYPE.to_string(),
            channel: event.channel,
            inputs_hash,
            payload: event.payload,
            confidence,
            execution_ref,
            timestamp: event.timestamp,
            metadata: HashMap::new(),
            correlation_ids: HashMap::new(),
        }
    }

    /// Completeness of the readings behind a payload.
    ///
    /// Decisions are deterministic; telemetry loses confidence for each
    /// optional reading the component did not report.
    pub fn confidence_for(payload: &EventPayload) -> f64 {
        match payload {
            EventPayload::Telemetry { sample } => {
                let missing = [sample.temperature_c.is_none(), sample.power_w.is_none()]
                    .iter()
                    .filter(|m| **m)
                    .count();
                1.0 - 0.1 * missing as f64
            }
            EventPayload::Debt { .. }
            | EventPayload::Decision { .. }
            | EventPayload::Quarantine { .. }
            | EventPayload::Balance { .. }
            | EventPayload::Health { .. } => 1.0,
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Add correlation ID
    pub fn with_correlation_id(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.correlation_ids.insert(key.into(), value.into());
        self
    }

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

    /// True for decisions that ask for intervention
    pub fn is_actionable(&self) -> bool {
        match &self.payload {
            EventPayload::Decision { decision } => decision.action.is_actionable(),
            EventPayload::Quarantine { .. } => true,
            _ => false,
        }
    }

    /// Get summary
    pub fn summary(&self) -> String {
        let detail = match &self.payload {
            EventPayload::Decision { decision } => decision.summary(),
            EventPayload::Quarantine { record } => record.reason.clone(),
            EventPayload::Debt { score, .. } => {
                format!("debt={:.2} severity={}", score.value, score.severity)
            }
            EventPayload::Health { health } => format!(
                "status={:?} quarantined={}/{}",
                health.status, health.quarantined_components, health.total_components
            ),
            EventPayload::Balance {
                smoothed_imbalance, ..
            } => format!("imbalance={:+.3}", smoothed_imbalance),
            EventPayload::Telemetry { sample } => format!(
                "cpu={:.1} mem={:.1} err={:.3}",
                sample.cpu_usage, sample.memory_usage, sample.error_rate
            ),
        };
        format!(
            "[{}] {} {} - {}",
            self.agent_id,
            self.channel,
            self.component_id().unwrap_or("system"),
            detail
        )
    }

    /// Decision action carried by the signal, if any
    pub fn action(&self) -> Option<MitigationAction> {
        match &self.payload {
            EventPayload::Decision { decision } => Some(decision.action),
            _ => None,
        }
    }
}
