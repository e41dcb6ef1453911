use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use newsdesk_types::NewsdeskError;

use crate::{extract_json, GenerationGateway, Prompt};

// ---------------------------------------------------------------------------
// OpenAiGateway
// ---------------------------------------------------------------------------

/// Chat-completions client that asks for a JSON object answer.
#[derive(Debug)]
pub struct OpenAiGateway {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiGateway {
    pub fn new(api_key: String) -> Self {
        let timeout = Duration::from_secs(120);
        Self {
            api_key,
            client: build_client(timeout),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4-turbo".to_string(),
            temperature: 0.7,
            timeout,
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = build_client(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(&self, prompt: &Prompt) -> serde_json::Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        })
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<serde_json::Value, NewsdeskError> {
        let choice = &body["choices"][0];
        if choice["finish_reason"] == "length" {
            return Err(NewsdeskError::MalformedOutput(
                "answer truncated at max tokens".into(),
            ));
        }
        let text = choice["message"]["content"].as_str().ok_or_else(|| {
            NewsdeskError::MalformedOutput("response has no message content".into())
        })?;
        extract_json(text)
    }

    fn transport_error(&self, e: reqwest::Error) -> NewsdeskError {
        if e.is_timeout() {
            NewsdeskError::RequestTimeout {
                provider: "openai".into(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            NewsdeskError::ProviderError {
                provider: "openai".into(),
                status: 0,
                message: e.to_string(),
                retryable: true,
            }
        }
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_error(status: reqwest::StatusCode, body: &str) -> NewsdeskError {
    let status_u16 = status.as_u16();
    match status_u16 {
        429 => {
            let retry_ms = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v["error"]["retry_after"].as_f64())
                .map(|s| (s * 1000.0) as u64)
                .unwrap_or(1000);
            NewsdeskError::RateLimited {
                provider: "openai".into(),
                retry_after_ms: retry_ms,
            }
        }
        401 | 403 => NewsdeskError::AuthError {
            provider: "openai".into(),
        },
        500 | 502 | 503 | 504 => NewsdeskError::ProviderError {
            provider: "openai".into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: true,
        },
        _ => NewsdeskError::ProviderError {
            provider: "openai".into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: false,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// GenerationGateway implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl GenerationGateway for OpenAiGateway {
    async fn generate(&self, prompt: &Prompt) -> Result<serde_json::Value, NewsdeskError> {
        let body = self.build_request_body(prompt);

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let response_body = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(map_error(status, &response_body));
        }

        let json: serde_json::Value =
            serde_json::from_str(&response_body).map_err(|e| NewsdeskError::ProviderError {
                provider: "openai".into(),
                status: status.as_u16(),
                message: format!("Failed to parse response JSON: {e}"),
                retryable: false,
            })?;

        self.parse_response(&json)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_body_produces_correct_structure() {
        let gw = OpenAiGateway::new("k".into())
            .with_model("gpt-4o".into())
            .with_temperature(0.2);
        let body = gw.build_request_body(&Prompt::new("be terse", "opinion #1"));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be terse");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "opinion #1");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn parse_response_extracts_json_content() {
        let gw = OpenAiGateway::new("k".into());
        let body = json!({
            "choices": [{
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "{\"headline\": \"Justices split\"}"}
            }]
        });
        assert_eq!(
            gw.parse_response(&body).unwrap(),
            json!({"headline": "Justices split"})
        );
    }

    #[test]
    fn parse_response_rejects_truncated_answers() {
        let gw = OpenAiGateway::new("k".into());
        let body = json!({
            "choices": [{"finish_reason": "length", "message": {"content": "{\"a\":"}}]
        });
        assert!(matches!(
            gw.parse_response(&body),
            Err(NewsdeskError::MalformedOutput(_))
        ));
    }

    #[test]
    fn parse_response_without_content_is_malformed() {
        let gw = OpenAiGateway::new("k".into());
        assert!(gw.parse_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn with_base_url_trims_trailing_slash() {
        let gw = OpenAiGateway::new("k".into()).with_base_url("http://localhost:8080/".into());
        assert_eq!(gw.base_url, "http://localhost:8080");
    }

    #[test]
    fn error_mapping_429_rate_limited() {
        let err = map_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "slow down", "retry_after": 2.5}}"#,
        );
        assert!(matches!(err, NewsdeskError::RateLimited { retry_after_ms: 2500, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn error_mapping_401_auth() {
        let err = map_error(reqwest::StatusCode::UNAUTHORIZED, "{}");
        assert!(matches!(err, NewsdeskError::AuthError { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn error_mapping_500_retryable_400_not() {
        let err = map_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": {"message": "boom"}}"#,
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("boom"));

        let err = map_error(reqwest::StatusCode::BAD_REQUEST, "plain text body");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("plain text body"));
    }
}
