//! reqwest-backed transport.

use async_trait::async_trait;
use planner_protocol::Endpoint;
use serde_json::Value;

use super::{RequestContext, Transport};
use crate::config::ClientConfig;
use crate::error::{PlannerError, Result};

/// Header carrying the ambient session credential.
pub const SESSION_HEADER: &str = "X-Session-Id";

const USER_AGENT: &str = concat!("course-planner/", env!("CARGO_PKG_VERSION"));

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| PlannerError::transport(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        context: &RequestContext,
        endpoint: Endpoint,
        body: Value,
    ) -> Result<Value> {
        let url = self.url(endpoint);
        // Every action, reads included, is a POST with a JSON body.
        let mut request = self.client.post(&url).json(&body);
        if let Some(session_id) = context.session_id() {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                PlannerError::transport(format!("Request to {} timed out", endpoint))
            } else {
                PlannerError::transport(format!("Failed to reach {}: {}", endpoint, err))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(endpoint = %endpoint, status = status.as_u16(), "Non-success status");
            return Err(PlannerError::status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|err| {
            PlannerError::transport(format!("Failed to read {} response: {}", endpoint, err))
        })?;

        // Acknowledgement endpoints may answer 2xx with no body at all.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            PlannerError::transport(format!("Response from {} was not JSON: {}", endpoint, err))
        })
    }
}
