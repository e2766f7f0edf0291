//! OpenAI-compatible chat-completions extractor.
//!
//! Sends one constrained prompt per message and parses the first JSON object
//! of the reply. Works against any server exposing `POST {base_url}/chat/completions`
//! (OpenAI, Ollama's `/v1` endpoint, vLLM, ...).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DetailExtractor, ExtractionError, FallbackExtractor, JobDetails, parse_details};

/// Maximum body bytes included in the prompt.
const MAX_PROMPT_BODY: usize = 6000;

/// Configuration for the extraction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Call the service at all. When false, every record uses the fallback.
    pub enabled: bool,
    /// API root, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Bearer token. Falls back to `OPENAI_API_KEY`.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4".into(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl ExtractionConfig {
    /// Build the extractor this configuration describes.
    pub fn build(&self) -> Box<dyn DetailExtractor> {
        if self.enabled {
            Box::new(ChatExtractor::new(self.clone()))
        } else {
            Box::new(FallbackExtractor)
        }
    }
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatExtractor {
    config: ExtractionConfig,
    agent: ureq::Agent,
}

impl ChatExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    /// The constrained prompt demanding `{company, title}` JSON.
    pub fn prompt(subject: &str, body: &str) -> String {
        let body = match body.char_indices().nth(MAX_PROMPT_BODY) {
            Some((cut, _)) => &body[..cut],
            None => body,
        };
        format!(
            "Extract the company and job title from this job application email. \
             Return only valid JSON with exactly these two keys, like:\n\
             {{\"company\": \"...\", \"title\": \"...\"}}\n\n\
             Subject: {subject}\n\n\
             Body: {body}"
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

impl DetailExtractor for ChatExtractor {
    fn extract(&self, subject: &str, body: &str) -> Result<JobDetails, ExtractionError> {
        let request = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "user", "content": Self::prompt(subject, body)}
            ],
            "temperature": 0,
        });

        let body_str = serde_json::to_string(&request).map_err(|e| ExtractionError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let mut req = self
            .agent
            .post(&self.endpoint())
            .set("Content-Type", "application/json");
        if !self.config.api_key.is_empty() {
            req = req.set("Authorization", &format!("Bearer {}", self.config.api_key));
        }

        let resp = req
            .send_string(&body_str)
            .map_err(|e: ureq::Error| ExtractionError::RequestFailed {
                message: e.to_string(),
            })?;

        let resp_str = resp.into_string().map_err(|e| ExtractionError::ParseError {
            message: e.to_string(),
        })?;

        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| ExtractionError::ParseError {
                message: e.to_string(),
            })?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ExtractionError::ParseError {
                message: "missing 'choices[0].message.content' field".into(),
            })?;

        parse_details(content)
    }
}

impl std::fmt::Debug for ChatExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatExtractor")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("has_api_key", &!self.config.api_key.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config_for(base_url: String) -> ExtractionConfig {
        ExtractionConfig {
            base_url,
            api_key: "test-key".into(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn extracts_details_from_completion() {
        let completion = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "{\"company\": \"Initech\", \"title\": \"Platform Engineer\"}"
                }
            }]
        });
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_header("content-type", "application/json")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(serde_json::json!({"model": "gpt-4", "temperature": 0})),
                Matcher::Regex("Thank you for applying to Initech".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion.to_string())
            .expect(1)
            .create();

        let extractor = ChatExtractor::new(config_for(format!("{}/v1", server.url())));
        let details = extractor
            .extract("Thank you for applying to Initech", "Platform Engineer role")
            .unwrap();

        assert_eq!(details.company, "Initech");
        assert_eq!(details.title, "Platform Engineer");
        mock.assert();
    }

    #[test]
    fn trailing_slash_in_base_url_is_ignored() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_body(
                serde_json::json!({
                    "choices": [{"message": {"content": "{\"company\": \"A\", \"title\": \"B\"}"}}]
                })
                .to_string(),
            )
            .expect(1)
            .create();

        let extractor = ChatExtractor::new(config_for(format!("{}/v1/", server.url())));
        assert_eq!(extractor.extract("s", "b").unwrap().company, "A");
        mock.assert();
    }

    #[test]
    fn server_error_is_request_failure() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("{\"error\":\"boom\"}")
            .expect(1)
            .create();
        let extractor = ChatExtractor::new(config_for(format!("{}/v1", server.url())));

        let err = extractor.extract("Application received", "").unwrap_err();
        assert!(matches!(err, ExtractionError::RequestFailed { .. }));
        mock.assert();
    }

    #[test]
    fn missing_content_is_parse_error() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_body("{\"choices\": []}")
            .create();
        let extractor = ChatExtractor::new(config_for(format!("{}/v1", server.url())));

        let err = extractor.extract("Application received", "").unwrap_err();
        assert!(matches!(err, ExtractionError::ParseError { .. }));
        mock.assert();
    }

    #[test]
    fn unreachable_service_is_request_failure() {
        let extractor = ChatExtractor::new(config_for("http://127.0.0.1:1".into()));
        let err = extractor.extract("Application received", "").unwrap_err();
        assert!(matches!(err, ExtractionError::RequestFailed { .. }));
    }

    #[test]
    fn prompt_demands_two_key_json() {
        let prompt = ChatExtractor::prompt("Subj", "Body text");
        assert!(prompt.contains("{\"company\": \"...\", \"title\": \"...\"}"));
        assert!(prompt.contains("Subject: Subj"));
        assert!(prompt.ends_with("Body: Body text"));
    }

    #[test]
    fn prompt_truncates_long_bodies() {
        let prompt = ChatExtractor::prompt("S", &"x".repeat(MAX_PROMPT_BODY * 2));
        assert!(prompt.len() < MAX_PROMPT_BODY + 300);
    }

    #[test]
    fn disabled_config_builds_fallback() {
        let config = ExtractionConfig {
            enabled: false,
            ..Default::default()
        };
        let details = config.build().extract("Hello", "").unwrap();
        assert_eq!(details, JobDetails::fallback("Hello"));
    }
}
