//! Scripted transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use planner_protocol::Endpoint;
use serde_json::Value;

use super::{RequestContext, Transport};
use crate::error::{PlannerError, Result};
use crate::lock;

#[derive(Debug, Clone)]
enum Outcome {
    Body(Value),
    Status(u16),
    Unreachable(String),
}

#[derive(Debug, Clone)]
struct Scripted {
    outcome: Outcome,
    delay: Option<Duration>,
}

/// A request as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub body: Value,
    pub session_id: Option<String>,
}

/// Transport that replays queued responses per endpoint.
///
/// Each call consumes the next queued response for its endpoint; an empty
/// queue is reported as a transport failure so unexpected calls are loud.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<Endpoint, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, endpoint: Endpoint, outcome: Outcome, delay: Option<Duration>) {
        lock(&self.scripts)
            .entry(endpoint)
            .or_default()
            .push_back(Scripted { outcome, delay });
    }

    /// Queues a 2xx response body.
    pub fn respond(&self, endpoint: Endpoint, body: Value) {
        self.push(endpoint, Outcome::Body(body), None);
    }

    /// Queues a 2xx response body delivered after `delay` (tokio time).
    pub fn respond_after(&self, endpoint: Endpoint, body: Value, delay: Duration) {
        self.push(endpoint, Outcome::Body(body), Some(delay));
    }

    /// Queues a non-2xx status.
    pub fn fail_status(&self, endpoint: Endpoint, status: u16) {
        self.push(endpoint, Outcome::Status(status), None);
    }

    /// Queues a network-level failure.
    pub fn fail_unreachable(&self, endpoint: Endpoint, message: &str) {
        self.push(endpoint, Outcome::Unreachable(message.to_string()), None);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of queued responses not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.scripts).values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        context: &RequestContext,
        endpoint: Endpoint,
        body: Value,
    ) -> Result<Value> {
        lock(&self.calls).push(RecordedCall {
            endpoint,
            body,
            session_id: context.session_id().map(str::to_string),
        });

        let next = lock(&self.scripts)
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);
        let Some(scripted) = next else {
            return Err(PlannerError::transport(format!(
                "no scripted response for {}",
                endpoint
            )));
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        match scripted.outcome {
            Outcome::Body(value) => Ok(value),
            Outcome::Status(status) => Err(PlannerError::status(status)),
            Outcome::Unreachable(message) => Err(PlannerError::transport(message)),
        }
    }
}
