//! Judge served by a remote HTTP endpoint

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use veritas_core::MediaAttachment;

use crate::adapter::{JudgeAdapter, JudgeError, JudgeInput, JudgeVerdict};

/// Request body posted to the judge endpoint
#[derive(Debug, Serialize)]
struct JudgeRequestBody<'a> {
    request_id: String,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    #[serde(skip_serializing_if = "no_media")]
    media: &'a [MediaAttachment],
}

fn no_media(media: &&[MediaAttachment]) -> bool {
    media.is_empty()
}

/// Response body expected from the judge endpoint
#[derive(Debug, Deserialize)]
struct JudgeResponseBody {
    score: f64,
    confidence: f64,
    #[serde(default)]
    cost: Option<f64>,
}

/// Judge reached over JSON/HTTP
#[derive(Debug)]
pub struct HttpJudge {
    name: String,
    /// Full URL the verdict request is posted to
    endpoint: String,
    api_key: Option<String>,
    /// Cost reported when the endpoint does not return one
    default_cost: f64,
    client: reqwest::Client,
}

impl HttpJudge {
    pub fn new(name: &str, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            api_key: None,
            default_cost: 0.0,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_default_cost(mut self, cost: f64) -> Self {
        self.default_cost = cost;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl JudgeAdapter for HttpJudge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !self.endpoint.is_empty()
    }

    async fn invoke(&self, input: &JudgeInput, timeout: Duration) -> Result<JudgeVerdict, JudgeError> {
        let start = Instant::now();

        let body = JudgeRequestBody {
            request_id: input.request_id.to_string(),
            content: &input.content,
            context: input.context.as_deref(),
            media: &input.media,
        };

        let mut request = self.client.post(&self.endpoint).timeout(timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                JudgeError::Timeout(timeout.as_millis() as u64)
            } else {
                JudgeError::ConnectionFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::RequestFailed(format!(
                "Status: {}, Body: {}",
                status, body
            )));
        }

        let parsed: JudgeResponseBody = response
            .json()
            .await
            .map_err(|e| JudgeError::InvalidResponse(e.to_string()))?;

        if !parsed.score.is_finite() || !parsed.confidence.is_finite() {
            return Err(JudgeError::InvalidResponse(
                "score and confidence must be finite".to_string(),
            ));
        }

        Ok(JudgeVerdict {
            score: parsed.score,
            confidence: parsed.confidence,
            cost: parsed.cost.unwrap_or(self.default_cost),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let input = JudgeInput::text("Water boils at 50C");
        let body = JudgeRequestBody {
            request_id: input.request_id.to_string(),
            content: &input.content,
            context: None,
            media: &input.media,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["content"], "Water boils at 50C");
        assert!(json.get("context").is_none());
        assert!(json.get("media").is_none());
    }

    #[test]
    fn test_response_cost_optional() {
        let parsed: JudgeResponseBody =
            serde_json::from_str(r#"{"score":0.7,"confidence":0.9}"#).unwrap();
        assert_eq!(parsed.cost, None);
        assert_eq!(parsed.score, 0.7);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_failure() {
        let judge = HttpJudge::new("remote", "http://127.0.0.1:9/verdict");
        let result = judge
            .invoke(&JudgeInput::text("x"), Duration::from_secs(2))
            .await;
        assert!(matches!(
            result,
            Err(JudgeError::ConnectionFailed(_)) | Err(JudgeError::Timeout(_))
        ));
    }
}
