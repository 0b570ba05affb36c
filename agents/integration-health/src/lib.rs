//! Integration Health Agent
//!
//! Deployable wrapper around the mitigation engine. Components report
//! telemetry and integration facts; the agent answers with throttle levels,
//! quarantines misbehaving components and gates commits and deployments.
//!
//! ## Architecture
//!
//! 1. **Contracts** (`contracts/`): request/response shapes and the
//!    `mitigation_signal` emitted for every engine event.
//! 2. **Engine** (`engine/`): the mitigation engine wired to policy gates.
//! 3. **Handler** (`handler/`): axum routes.
//! 4. **Telemetry** (`telemetry/`): Prometheus metrics and signal emission.
//! 5. **Client** (`client/`): HTTP client for other services.

pub mod client;
pub mod engine;
pub mod handler;
pub mod telemetry;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
