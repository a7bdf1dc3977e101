//! HTTP assessment oracle client
//!
//! POSTs one JSON request per attempt and expects an `OracleAssessment`
//! body back. Authentication is a bearer token when an API key is configured.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{AssessmentOracle, OracleAssessment, OracleError, OracleRequest};

const USER_AGENT: &str = "pte-scoring/0.1.0";

/// Wire body: the request plus the optional model name
#[derive(Serialize)]
struct AssessBody<'a> {
    #[serde(flatten)]
    request: &'a OracleRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

/// Oracle backed by an HTTP endpoint
pub struct HttpOracleClient {
    http_client: reqwest::Client,
    endpoint: reqwest::Url,
    api_key: Option<String>,
    model: Option<String>,
    timeout_ms: u64,
}

impl HttpOracleClient {
    /// Build a client; the transport timeout matches the engine's call timeout
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        model: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| OracleError::Unavailable(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            api_key,
            model,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

#[async_trait]
impl AssessmentOracle for HttpOracleClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn assess(&self, request: &OracleRequest) -> Result<OracleAssessment, OracleError> {
        tracing::debug!(
            attempt_id = %request.attempt_id,
            subtype = %request.subtype,
            "Requesting oracle assessment"
        );

        let body = AssessBody {
            request,
            model: self.model.as_deref(),
        };

        let mut builder = self.http_client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(self.timeout_ms)
            } else {
                OracleError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::QuotaExhausted);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OracleError::Api(status.as_u16(), error_text));
        }

        let assessment: OracleAssessment = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        assessment.validate()?;

        tracing::debug!(
            attempt_id = %request.attempt_id,
            content = assessment.content,
            pronunciation = assessment.pronunciation,
            fluency = assessment.fluency,
            "Oracle assessment received"
        );

        Ok(assessment)
    }
}
