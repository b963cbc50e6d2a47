//! Client for the Gemini `generateContent` REST endpoint.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub images: Vec<ImagePayload>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            images: Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("quota exhausted")]
    RateLimited,

    #[error("model request failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, system: &str, turns: &[Turn]) -> Result<String, ModelError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn build_request(system: &str, turns: &[Turn]) -> GenerateRequest {
    let mut contents: Vec<Content> = Vec::new();

    for turn in turns {
        let mut parts = Vec::with_capacity(1 + turn.images.len());
        if !turn.text.is_empty() {
            parts.push(Part::Text(turn.text.clone()));
        }
        parts.extend(turn.images.iter().map(|image| {
            Part::InlineData(InlineData {
                mime_type: image.mime_type.clone(),
                data: BASE64.encode(&image.data),
            })
        }));
        if parts.is_empty() {
            continue;
        }

        // The API wants alternating roles, so back-to-back turns share one content
        match contents.last_mut() {
            Some(last) if last.role == Some(turn.role) => last.parts.extend(parts),
            _ => contents.push(Content {
                role: Some(turn.role),
                parts,
            }),
        }
    }

    GenerateRequest {
        system_instruction: (!system.trim().is_empty()).then(|| Content {
            role: None,
            parts: vec![Part::Text(system.to_string())],
        }),
        contents,
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, ModelError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(ModelError::Upstream("empty response".into()))
    } else {
        Ok(text)
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_base: &str, model: &str, api_key: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Option<Self> {
        let key = config.gemini_api_key.as_deref()?;
        Some(Self::new(http, &config.gemini_api_base, &config.gemini_model, key))
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, system: &str, turns: &[Turn]) -> Result<String, ModelError> {
        let request = build_request(system, turns);
        debug!("Gemini: sending {} content block(s)", request.contents.len());

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Gemini: rate limited");
            return Err(ModelError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Upstream(format!("{}: {}", status, body)));
        }

        extract_text(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};

    #[test]
    fn test_request_shape() {
        let mut with_image = Turn::user("what is this?");
        with_image.images.push(ImagePayload {
            mime_type: "image/png".into(),
            data: vec![1, 2, 3],
        });
        let turns = vec![Turn::user("hi"), with_image, Turn::model("a cat")];

        let json = serde_json::to_value(build_request("be brief", &turns)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(json["systemInstruction"].get("role").is_none());

        // Two user turns merge into one content block
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"].as_array().unwrap().len(), 3);
        assert_eq!(contents[0]["parts"][2]["inlineData"]["mimeType"], "image/png");
        assert_eq!(contents[0]["parts"][2]["inlineData"]["data"], "AQID");
        assert_eq!(contents[1]["role"], "model");
    }

    #[test]
    fn test_empty_system_is_omitted() {
        let json = serde_json::to_value(build_request("  ", &[Turn::user("x")])).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    async fn fake_endpoint(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_generate_success_and_rate_limit() {
        let router = Router::new()
            .route(
                "/models/good:generateContent",
                post(|| async {
                    Json(serde_json::json!({
                        "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello"}, {"text": " there"}]}}]
                    }))
                }),
            )
            .route(
                "/models/busy:generateContent",
                post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "quota") }),
            );
        let base = fake_endpoint(router).await;

        let good = GeminiClient::new(reqwest::Client::new(), &base, "models/good", "k");
        let reply = good.generate("", &[Turn::user("hi")]).await.unwrap();
        assert_eq!(reply, "Hello there");

        let busy = GeminiClient::new(reqwest::Client::new(), &base, "busy", "k");
        assert!(matches!(
            busy.generate("", &[Turn::user("hi")]).await,
            Err(ModelError::RateLimited)
        ));
    }
}
