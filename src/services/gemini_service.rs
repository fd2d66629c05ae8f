// src/services/gemini_service.rs
use crate::errors::TranslateError;
use crate::services::credentials::{CREDENTIAL_REJECTED_MARKER, CredentialStore};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One image-editing request: the source image plus the composed prompt.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub mime_type: &'a str,
    /// Base64 payload, without the data-URL header.
    pub data: &'a str,
    pub prompt: &'a str,
    pub image_size: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Image { mime_type: Option<String>, data: Bytes },
    Text(String),
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the response parts in the order the service produced them.
    /// A rejected credential must surface as [`TranslateError::Credential`].
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<ResponsePart>, TranslateError>;
}

pub struct GeminiService {
    client: Client,
    api_base: String,
    model: String,
    credentials: Arc<CredentialStore>,
}

impl GeminiService {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::RemoteCall(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
            credentials,
        })
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn request_body(request: &GenerationRequest<'_>) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": request.mime_type,
                            "data": request.data
                        }
                    },
                    { "text": request.prompt }
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "imageSize": request.image_size }
            }
        })
    }

    fn error_from_response(status: StatusCode, body: &str) -> TranslateError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());
        let message = if message.is_empty() {
            format!("Image generation failed with status {}", status)
        } else {
            message
        };

        if message.contains(CREDENTIAL_REJECTED_MARKER)
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
        {
            warn!("Image generation rejected the credential ({}): {}", status, message);
            TranslateError::Credential(message)
        } else {
            TranslateError::RemoteCall(message)
        }
    }

    /// Pulls the parts of the first candidate out of a `generateContent` reply.
    pub fn parse_parts(result: &Value) -> Result<Vec<ResponsePart>, TranslateError> {
        let parts = match result["candidates"][0]["content"]["parts"].as_array() {
            Some(parts) => parts,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
            if let Some(inline) = inline {
                let Some(data) = inline["data"].as_str().filter(|d| !d.is_empty()) else {
                    continue;
                };
                let bytes = general_purpose::STANDARD
                    .decode(data)
                    .map_err(|e| TranslateError::RemoteCall(format!("Failed to decode image: {}", e)))?;
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string);
                out.push(ResponsePart::Image {
                    mime_type,
                    data: Bytes::from(bytes),
                });
            } else if let Some(text) = part["text"].as_str() {
                out.push(ResponsePart::Text(text.to_string()));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ImageGenerator for GeminiService {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<ResponsePart>, TranslateError> {
        let api_key = self
            .credentials
            .api_key()
            .await
            .ok_or_else(|| TranslateError::Credential("API Key is missing".to_string()))?;

        let start = Instant::now();
        debug!(
            "generateContent: model={} prompt_chars={} image_size={}",
            self.model,
            request.prompt.len(),
            request.image_size
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(|e| TranslateError::RemoteCall(format!("Image generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::error_from_response(status, &error_text));
        }

        let result: Value = response.json().await.map_err(|e| {
            TranslateError::RemoteCall(format!("Failed to parse generation response: {}", e))
        })?;

        let parts = Self::parse_parts(&result)?;
        info!(
            "generateContent returned {} part(s) in {}ms",
            parts.len(),
            start.elapsed().as_millis()
        );
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service(model: &str) -> GeminiService {
        GeminiService::new(
            "https://example.test/v1beta",
            model,
            Duration::from_secs(5),
            Arc::new(CredentialStore::new(None)),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_accepts_bare_and_prefixed_models() {
        assert_eq!(
            service("gemini-x").endpoint(),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
        assert_eq!(
            service("models/gemini-x").endpoint(),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
    }

    #[test]
    fn request_body_carries_image_prompt_and_size() {
        let body = GeminiService::request_body(&GenerationRequest {
            mime_type: "image/jpeg",
            data: "QUJD",
            prompt: "translate",
            image_size: "2K",
        });
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert_eq!(parts[1]["text"], "translate");
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn parts_keep_order_and_optional_mime() {
        let reply = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here you go" },
                        { "inlineData": { "data": "AAEC" } },
                        { "inlineData": { "mimeType": "image/webp", "data": "AwQ=" } }
                    ]
                }
            }]
        });
        let parts = GeminiService::parse_parts(&reply).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], ResponsePart::Text("Here you go".into()));
        assert_matches!(&parts[1], ResponsePart::Image { mime_type: None, data } if data[..] == [0u8, 1, 2]);
        assert_matches!(&parts[2], ResponsePart::Image { mime_type: Some(m), .. } if m == "image/webp");
    }

    #[test]
    fn missing_candidates_is_empty_not_error() {
        assert!(GeminiService::parse_parts(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn rejected_key_is_a_credential_error() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert_matches!(
            GeminiService::error_from_response(StatusCode::NOT_FOUND, body),
            TranslateError::Credential(m) if m == "Requested entity was not found."
        );
        assert_matches!(
            GeminiService::error_from_response(StatusCode::FORBIDDEN, "denied"),
            TranslateError::Credential(_)
        );
        assert_matches!(
            GeminiService::error_from_response(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            TranslateError::RemoteCall(m) if m == "slow down"
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let err = service("m")
            .generate(GenerationRequest {
                mime_type: "image/png",
                data: "",
                prompt: "",
                image_size: "1K",
            })
            .await
            .unwrap_err();
        assert_matches!(err, TranslateError::Credential(m) if m == "API Key is missing");
    }
}
