//! Thin client for a hosted document-analysis service (Azure Document
//! Intelligence wire format).
//!
//! This is the alternative to the grid pipeline for documents that match a
//! pre-trained or custom analysis model: the whole document is submitted
//! once and the service returns labeled fields with confidences. The API is
//! asynchronous on the server side — submission answers `202 Accepted` with
//! an `Operation-Location` to poll until the analysis settles.

use crate::error::FieldLensError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const API_VERSION: &str = "2024-11-30";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 60;

/// One extracted field from an analysis run.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzedField {
    /// Field kind as reported by the service (`string`, `date`, ...).
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    /// Text content as written on the document.
    pub content: Option<String>,
    /// Service confidence in `[0, 1]`.
    pub confidence: Option<f64>,
}

/// Settled result of a document analysis.
#[derive(Debug)]
pub struct AnalysisResult {
    /// Server-side operation identifier, useful for support requests.
    pub operation_id: String,
    /// Labeled fields keyed by the model's field names.
    pub fields: HashMap<String, AnalyzedField>,
}

/// Client bound to one service endpoint and analysis model.
pub struct DocumentAnalysisClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_id: String,
}

impl DocumentAnalysisClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<Self, FieldLensError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FieldLensError::Analysis {
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model_id: model_id.into(),
        })
    }

    /// Submit a document and poll until the analysis settles.
    pub async fn analyze(&self, document: &[u8]) -> Result<AnalysisResult, FieldLensError> {
        let submit_url = format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}&locale=en",
            self.endpoint, self.model_id, API_VERSION
        );
        let body = json!({ "base64Source": STANDARD.encode(document) });

        let response = self
            .client
            .post(&submit_url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FieldLensError::Analysis {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() != 202 {
            let body = response.text().await.unwrap_or_default();
            return Err(FieldLensError::Analysis {
                detail: format!("submission returned HTTP {status}: {body}"),
            });
        }
        let poll_url = response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| FieldLensError::Analysis {
                detail: "submission accepted but no Operation-Location header".to_string(),
            })?;
        let operation_id = operation_id_from_url(&poll_url);
        debug!("Analysis submitted, operation {}", operation_id);

        for _ in 0..MAX_POLLS {
            tokio::time::sleep(POLL_INTERVAL).await;
            let operation: AnalyzeOperation = self
                .client
                .get(&poll_url)
                .header("Ocp-Apim-Subscription-Key", &self.api_key)
                .send()
                .await
                .map_err(|e| FieldLensError::Analysis {
                    detail: e.to_string(),
                })?
                .json()
                .await
                .map_err(|e| FieldLensError::Analysis {
                    detail: format!("malformed operation body: {e}"),
                })?;

            match operation.status.as_str() {
                "succeeded" => {
                    let fields = operation
                        .analyze_result
                        .and_then(|r| r.documents.into_iter().next())
                        .map(|d| d.fields)
                        .unwrap_or_default();
                    return Ok(AnalysisResult {
                        operation_id,
                        fields,
                    });
                }
                "failed" => {
                    return Err(FieldLensError::Analysis {
                        detail: format!("operation {operation_id} failed on the server"),
                    })
                }
                other => debug!("Analysis operation {} still {}", operation_id, other),
            }
        }
        Err(FieldLensError::Analysis {
            detail: format!("operation {operation_id} did not settle within the polling budget"),
        })
    }
}

/// Last path segment of the Operation-Location URL, query string stripped.
fn operation_id_from_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}

#[derive(Debug, Deserialize)]
struct AnalyzeOperation {
    status: String,
    #[serde(rename = "analyzeResult")]
    analyze_result: Option<AnalyzeResultBody>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResultBody {
    #[serde(default)]
    documents: Vec<AnalyzedDocument>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedDocument {
    #[serde(default)]
    fields: HashMap<String, AnalyzedField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_id_strips_path_and_query() {
        let url = "https://svc.example.com/documentintelligence/documentModels/m/analyzeResults/abc-123?api-version=2024-11-30";
        assert_eq!(operation_id_from_url(url), "abc-123");
    }

    #[test]
    fn operation_body_deserializes_fields() {
        let raw = r#"{
            "status": "succeeded",
            "analyzeResult": {
                "documents": [{
                    "fields": {
                        "AccountNumber": {
                            "type": "string",
                            "content": "12-345-678",
                            "confidence": 0.97
                        }
                    }
                }]
            }
        }"#;
        let op: AnalyzeOperation = serde_json::from_str(raw).unwrap();
        assert_eq!(op.status, "succeeded");
        let fields = op.analyze_result.unwrap().documents.remove(0).fields;
        let field = &fields["AccountNumber"];
        assert_eq!(field.content.as_deref(), Some("12-345-678"));
        assert_eq!(field.confidence, Some(0.97));
    }

    #[test]
    fn running_operation_has_no_result_yet() {
        let op: AnalyzeOperation =
            serde_json::from_str(r#"{"status":"running"}"#).unwrap();
        assert_eq!(op.status, "running");
        assert!(op.analyze_result.is_none());
    }
}
