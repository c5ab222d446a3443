//! Remote call seam.
//!
//! The core only needs one shape from the outside world:
//! `send(context, endpoint, body) -> json-or-error`. [`HttpTransport`] is the
//! production implementation; [`ApiClient`] layers error-field detection and
//! typed decoding on top of any [`Transport`].
//!
//! No retries and no timeouts live here. Timeouts belong to the transport.

mod http;
#[cfg(any(test, feature = "test-helpers"))]
mod mock;

pub use http::HttpTransport;
#[cfg(any(test, feature = "test-helpers"))]
pub use mock::{MockTransport, RecordedCall};

use std::sync::Arc;

use async_trait::async_trait;
use planner_protocol::{error_message, Endpoint};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{PlannerError, Result};

/// Ambient credential attached to an outgoing request.
///
/// Snapshotted from the session manager when an operation starts and passed
/// explicitly to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    session_id: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Empty ids are dropped; they are never attached to a request.
    pub fn with_session(session_id: Option<&str>) -> Self {
        Self {
            session_id: session_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues one request. Non-2xx statuses and unreachable hosts are errors;
    /// the body of a 2xx response is returned as-is.
    async fn send(&self, context: &RequestContext, endpoint: Endpoint, body: Value)
        -> Result<Value>;
}

/// Typed access to the API over a shared transport.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sends `request` and returns the raw body, with application errors
    /// (an `error` field) already turned into `Err`.
    pub async fn call_value<Req>(
        &self,
        context: &RequestContext,
        endpoint: Endpoint,
        request: &Req,
    ) -> Result<Value>
    where
        Req: Serialize + ?Sized,
    {
        let body = serde_json::to_value(request).map_err(|source| PlannerError::Json {
            context: format!("encoding {} request", endpoint),
            source,
        })?;

        tracing::debug!(
            endpoint = %endpoint,
            has_session = context.session_id().is_some(),
            "Sending request"
        );
        let response = self.transport.send(context, endpoint, body).await?;

        if let Some(message) = error_message(&response) {
            return Err(PlannerError::Application(message));
        }
        Ok(response)
    }

    pub async fn call<Req, Resp>(
        &self,
        context: &RequestContext,
        endpoint: Endpoint,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let value = self.call_value(context, endpoint, request).await?;
        decode(endpoint, value)
    }

    /// For acknowledgement-only endpoints; the body is ignored.
    pub async fn call_ack<Req>(
        &self,
        context: &RequestContext,
        endpoint: Endpoint,
        request: &Req,
    ) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        self.call_value(context, endpoint, request).await.map(|_| ())
    }
}

pub(crate) fn decode<T: DeserializeOwned>(endpoint: Endpoint, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| PlannerError::shape(endpoint, err.to_string()))
}
