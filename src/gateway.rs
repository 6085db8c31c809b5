//! Model gateway: the seam between the pipeline and a vision-capable
//! language model.
//!
//! The pipeline only ever talks to `Arc<dyn ModelGateway>`, so tests can
//! script responses and the production backend can change without touching
//! orchestration logic. A request is an ordered list of role-tagged
//! messages, at most one image attachment with a detail hint, an optional
//! JSON-schema response format, and a sampling temperature (the orchestrator
//! pins it at 0 for determinism).
//!
//! [`OpenAiGateway`] is the shipped implementation: it speaks the OpenAI
//! chat-completions wire format over `reqwest`, embedding the image as a
//! base64 data-URI content part and requesting strict `json_schema` output
//! when a schema is supplied.

use crate::config::ExtractionConfig;
use crate::error::FieldLensError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

// ── Request model ────────────────────────────────────────────────────────

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// A role-tagged text message.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// How much resolution/attention the vision model should spend on an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    Low,
    High,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Low => "low",
            DetailLevel::High => "high",
        }
    }

    /// Pick a detail level from image dimensions: small images fit a single
    /// low-detail tile; anything larger needs the high-detail tile budget.
    pub fn for_dimensions(width: u32, height: u32) -> DetailLevel {
        if width <= 512 && height <= 512 {
            DetailLevel::Low
        } else {
            DetailLevel::High
        }
    }
}

/// A single image attached to the user turn.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub detail: DetailLevel,
}

/// JSON-schema response format derived from the caller's target type.
#[derive(Debug, Clone)]
pub struct SchemaFormat {
    pub name: String,
    pub schema: Value,
}

/// A complete gateway request.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub messages: Vec<ChatMessage>,
    pub image: Option<ImageAttachment>,
    pub response_schema: Option<SchemaFormat>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

// ── Seam traits ──────────────────────────────────────────────────────────

/// External model capability: submit messages (+ image + schema), receive
/// model text or schema-conformant JSON as a string.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, request: GatewayRequest) -> Result<String, FieldLensError>;
}

/// A caller-defined extraction result shape.
///
/// The schema drives the `json_schema` response format sent to the gateway;
/// the pipeline treats the type as opaque beyond "deserializable with a
/// schema".
///
/// # Example
/// ```rust
/// use fieldlens::ExtractionTarget;
/// use serde::Deserialize;
/// use serde_json::{json, Value};
///
/// #[derive(Deserialize)]
/// struct BankAccount {
///     account_number: String,
/// }
///
/// impl ExtractionTarget for BankAccount {
///     fn schema_name() -> &'static str {
///         "bank_account"
///     }
///     fn schema() -> Value {
///         json!({
///             "type": "object",
///             "properties": {
///                 "account_number": {
///                     "type": "string",
///                     "description": "The full account number without prefix"
///                 }
///             },
///             "required": ["account_number"],
///             "additionalProperties": false
///         })
///     }
/// }
/// ```
pub trait ExtractionTarget: DeserializeOwned {
    /// Schema name reported to the gateway (letters, digits, underscores).
    fn schema_name() -> &'static str;

    /// JSON schema the model's output must conform to.
    fn schema() -> Value;
}

// ── OpenAI implementation ────────────────────────────────────────────────

/// Chat-completions gateway over HTTPS.
pub struct OpenAiGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiGateway {
    /// Build a gateway from explicit configuration. The HTTP client is
    /// reusable across requests and carries no request-specific state.
    pub fn new(config: &ExtractionConfig) -> Result<Self, FieldLensError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| FieldLensError::Gateway {
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn complete(&self, request: GatewayRequest) -> Result<String, FieldLensError> {
        let body = build_request_body(&self.model, &request);
        debug!(
            "Gateway call: model={}, image={}, schema={}",
            self.model,
            request.image.is_some(),
            request
                .response_schema
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("none"),
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FieldLensError::Gateway {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FieldLensError::GatewayStatus {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion =
            response.json().await.map_err(|e| FieldLensError::Gateway {
                detail: format!("malformed completion envelope: {e}"),
            })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| FieldLensError::Gateway {
                detail: "completion contained no choices".to_string(),
            })
    }
}

/// Build the chat-completions JSON body for a request.
///
/// The image attaches to the last user message as a base64 data-URI content
/// part; all other messages are plain strings. Kept as a free function so
/// the wire shape is unit-testable without a network.
fn build_request_body(model: &str, request: &GatewayRequest) -> Value {
    let last_user = request
        .messages
        .iter()
        .rposition(|m| m.role == Role::User);

    let messages: Vec<Value> = request
        .messages
        .iter()
        .enumerate()
        .map(|(idx, msg)| {
            if Some(idx) == last_user {
                if let Some(image) = &request.image {
                    let data_uri = format!(
                        "data:{};base64,{}",
                        image.media_type,
                        STANDARD.encode(&image.bytes)
                    );
                    return json!({
                        "role": msg.role.as_str(),
                        "content": [
                            { "type": "text", "text": msg.text },
                            {
                                "type": "image_url",
                                "image_url": { "url": data_uri, "detail": image.detail.as_str() }
                            }
                        ]
                    });
                }
            }
            json!({ "role": msg.role.as_str(), "content": msg.text })
        })
        .collect();

    let mut body = json!({
        "model": model,
        "temperature": request.temperature,
        "messages": messages,
    });

    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    if let Some(schema) = &request.response_schema {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "schema": schema.schema,
                "strict": true
            }
        });
    }

    body
}

// ── Response envelope ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_image() -> GatewayRequest {
        GatewayRequest {
            messages: vec![
                ChatMessage::system("find the field"),
                ChatMessage::user(""),
            ],
            image: Some(ImageAttachment {
                bytes: vec![1, 2, 3],
                media_type: "image/jpeg",
                detail: DetailLevel::High,
            }),
            response_schema: Some(SchemaFormat {
                name: "grid_cells".to_string(),
                schema: json!({"type": "object"}),
            }),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    #[test]
    fn detail_level_from_dimensions() {
        assert_eq!(DetailLevel::for_dimensions(512, 512), DetailLevel::Low);
        assert_eq!(DetailLevel::for_dimensions(513, 512), DetailLevel::High);
        assert_eq!(DetailLevel::for_dimensions(512, 513), DetailLevel::High);
        assert_eq!(DetailLevel::for_dimensions(2550, 3300), DetailLevel::High);
    }

    #[test]
    fn body_attaches_image_to_user_turn() {
        let body = build_request_body("gpt-4o", &request_with_image());
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.0);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        // System turn stays a plain string.
        assert!(messages[0]["content"].is_string());
        // User turn carries text + image parts.
        let parts = messages[1]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["detail"], "high");
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn body_includes_strict_schema_format() {
        let body = build_request_body("gpt-4o", &request_with_image());
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "grid_cells");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn body_without_schema_omits_response_format() {
        let mut req = request_with_image();
        req.response_schema = None;
        let body = build_request_body("gpt-4o", &req);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn body_without_image_keeps_string_content() {
        let req = GatewayRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
            image: None,
            response_schema: None,
            temperature: 0.0,
            max_tokens: None,
        };
        let body = build_request_body("gpt-4o", &req);
        assert_eq!(body["messages"][1]["content"], "hello");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn body_carries_max_tokens_when_set() {
        let mut req = request_with_image();
        req.max_tokens = Some(4096);
        let body = build_request_body("gpt-4o", &req);
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn completion_envelope_deserializes() {
        let raw = r#"{"choices":[{"message":{"content":"{\"cell_labels\":[\"E5\"]}"}}]}"#;
        let parsed: ChatCompletion = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"cell_labels\":[\"E5\"]}")
        );
    }
}
