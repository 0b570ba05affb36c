//! Mitigation signal emitter
//!
//! Engine events are turned into `MitigationSignal`s and pushed through a
//! bounded queue to a background task. The task POSTs each signal to the
//! configured webhook, or only logs it when none is configured. Emission
//! never blocks or fails an evaluation.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{Result, TelemetryConfig, TelemetryError};
use crate::contracts::MitigationSignal;
use synapse_core::{EventBus, MitigationEvent};

/// Calculate SHA-256 hash of an event's inputs for deduplication
pub fn calculate_inputs_hash(event: &MitigationEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.channel.as_str().as_bytes());
    if let Ok(payload) = serde_json::to_string(&event.payload) {
        hasher.update(payload.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// HTTP sink for signals
pub struct WebhookClient {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn send(&self, signal: &MitigationSignal) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(signal)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TelemetryError::HttpError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TelemetryError::EmissionFailed(format!(
                "webhook returned {}",
                response.status()
            )))
        }
    }
}

/// Async, non-blocking signal emitter
pub struct SignalEmitter {
    config: TelemetryConfig,
    instance_id: Uuid,
    sender: mpsc::Sender<MitigationSignal>,
}

impl SignalEmitter {
    /// Create the emitter and spawn its background task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: TelemetryConfig) -> Self {
        let (sender, mut receiver) = mpsc::channel::<MitigationSignal>(config.max_queue_size.max(1));
        let client = config
            .webhook_url
            .as_ref()
            .map(|url| Arc::new(WebhookClient::new(url.clone(), config.timeout_ms)));

        tokio::spawn(async move {
            while let Some(signal) = receiver.recv().await {
                match &client {
                    Some(client) => {
                        if let Err(e) = client.send(&signal).await {
                            tracing::warn!(
                                event_id = %signal.event_id,
                                error = %e,
                                "Failed to emit mitigation signal"
                            );
                        } else {
                            tracing::debug!(
                                event_id = %signal.event_id,
                                channel = %signal.channel,
                                "Emitted mitigation signal"
                            );
                        }
                    }
                    None => {
                        tracing::debug!(
                            event_id = %signal.event_id,
                            channel = %signal.channel,
                            summary = %signal.summary(),
                            "Mitigation signal"
                        );
                    }
                }
            }
        });

        Self {
            config,
            instance_id: Uuid::new_v4(),
            sender,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Queue a signal, waiting for space
    pub async fn emit(&self, signal: MitigationSignal) -> Result<()> {
        self.sender
            .send(signal)
            .await
            .map_err(|e| TelemetryError::EmissionFailed(format!("Failed to queue signal: {}", e)))
    }

    /// Queue a signal, dropping it when the queue is full
    pub fn try_emit(&self, signal: MitigationSignal) -> Result<()> {
        self.sender
            .try_send(signal)
            .map_err(|e| TelemetryError::EmissionFailed(format!("Failed to queue signal: {}", e)))
    }

    /// Wrap an engine event as a signal from this agent instance
    pub fn signal_for(&self, event: MitigationEvent) -> MitigationSignal {
        let inputs_hash = calculate_inputs_hash(&event);
        MitigationSignal::from_event(event, inputs_hash, self.instance_id.to_string())
    }

    /// Forward every event published on `bus` until the bus closes.
    ///
    /// Returns `None` when signal emission is disabled.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Option<JoinHandle<()>> {
        if !self.config.emit_signals {
            return None;
        }

        let mut events = bus.subscribe();
        let emitter = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let signal = emitter.signal_for(event);
                        if let Err(e) = emitter.try_emit(signal) {
                            tracing::warn!(error = %e, "Dropping mitigation signal");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Signal emitter lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}
