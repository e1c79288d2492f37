//! Best-effort dashboard forwarding (§6).
//!
//! `AGNETO_DASHBOARD_ENDPOINT`, when set and http(s), receives a copy of
//! every `DomainEvent` as JSON. This is explicitly non-critical per the
//! spec: a slow or dead dashboard must never block or fail a task.
//! Modeled on the teacher's treatment of optional external sinks in
//! `beads_bridge.rs` — the call is spawned and its result only logged,
//! never surfaced to the caller.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use crate::events::DomainEvent;

#[derive(Clone)]
pub struct DashboardForwarder {
    client: Client,
    endpoint: Arc<String>,
}

impl DashboardForwarder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: Arc::new(endpoint.into()),
        }
    }

    /// Fires a POST of `event` in the background. Never awaited by the
    /// caller and never surfaces an error — a failing dashboard must not
    /// affect task progress.
    pub fn forward(&self, event: &DomainEvent) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let body = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize event for dashboard forwarding");
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = post(&client, &endpoint, &body).await {
                tracing::warn!(error = %e, endpoint = %endpoint, "dashboard forwarding failed");
            }
        });
    }
}

async fn post(client: &Client, endpoint: &str, body: &serde_json::Value) -> Result<(), reqwest::Error> {
    client.post(endpoint).json(body).send().await?.error_for_status()?;
    Ok(())
}

/// No-op variant used when `AGNETO_DASHBOARD_ENDPOINT` is unset, so
/// call-sites don't need an `Option<DashboardForwarder>` branch at every
/// publish point.
#[derive(Clone, Default)]
pub struct NullForwarder;

impl NullForwarder {
    pub fn forward(&self, _event: &DomainEvent) {}
}

#[derive(Clone)]
pub enum Dashboard {
    Live(DashboardForwarder),
    Disabled(NullForwarder),
}

impl Dashboard {
    pub fn from_endpoint(endpoint: Option<String>) -> Self {
        match endpoint {
            Some(url) => Dashboard::Live(DashboardForwarder::new(url)),
            None => Dashboard::Disabled(NullForwarder),
        }
    }

    pub fn forward(&self, event: &DomainEvent) {
        match self {
            Dashboard::Live(f) => f.forward(event),
            Dashboard::Disabled(f) => f.forward(event),
        }
    }
}

fn _assert_event_serializable<T: Serialize>(_: &T) {}
