use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Instruction sent alongside the invoice image.
pub const EXTRACTION_PROMPT: &str = r#"Extract the following information from this invoice image and return it in JSON format:
{
    "CompanyName": "The name of the company that issued the invoice",
    "CompanyAddress": "The full address of the company",
    "CustomerName": "The name of the customer",
    "CustomerAddress": "The full address of the customer",
    "InvoiceNumber": "The invoice number or ID",
    "Date": "The invoice date in YYYY-MM-DD format",
    "DueDate": "The payment due date in YYYY-MM-DD format",
    "Subtotal": "The subtotal amount as a number without currency symbols",
    "TaxAmount": "The tax amount as a number without currency symbols",
    "TotalAmount": "The total amount as a number without currency symbols",
    "LineItems": [
        {
            "Description": "Description of the item",
            "Quantity": "Quantity as a number",
            "UnitPrice": "Unit price as a number without currency symbols",
            "TotalPrice": "Total price as a number without currency symbols"
        }
    ]
}

Important:
- Return ONLY the JSON object, nothing else
- If you can't find a value, use null
- Make sure all monetary values are numbers without currency symbols
- Format dates as YYYY-MM-DD
- If there are multiple line items, include them all"#;

#[derive(Debug, Error)]
pub enum HostedError {
    #[error("Hosted model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Hosted model returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Hosted model returned no text")]
    EmptyReply,
    #[error("Hosted model unavailable: {0}")]
    Unavailable(String),
}

/// Abstraction over a hosted vision-language model.
/// Implementations accept raw image bytes plus an instruction and return the free-text reply.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> Result<String, HostedError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a preset reply or a preset failure without touching the network.
pub struct MockVision {
    reply: Result<String, String>,
}

impl MockVision {
    pub fn replying(text: impl Into<String>) -> Self {
        Self { reply: Ok(text.into()) }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self { reply: Err(reason.into()) }
    }
}

#[async_trait]
impl VisionBackend for MockVision {
    async fn generate(
        &self,
        _prompt: &str,
        _image_bytes: &[u8],
        _mime_type: &str,
    ) -> Result<String, HostedError> {
        self.reply.clone().map_err(HostedError::Unavailable)
    }
}

// ── Gemini backend ────────────────────────────────────────────────────────────

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn request_body(prompt: &str, image_bytes: &[u8], mime_type: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part { text: Some(prompt.to_string()), ..Default::default() },
                Part {
                    inline_data: Some(Blob {
                        mime_type: mime_type.to_string(),
                        data: STANDARD.encode(image_bytes),
                    }),
                    ..Default::default()
                },
            ],
        }],
    }
}

/// Concatenated text parts of the first candidate.
fn reply_text(response: GenerateResponse) -> Result<String, HostedError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(HostedError::EmptyReply);
    }
    Ok(text)
}

/// Google Gemini `generateContent` over REST.
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HostedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    async fn generate(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> Result<String, HostedError> {
        debug!(
            model = %self.model,
            bytes = image_bytes.len(),
            mime_type,
            "Sending invoice image to hosted model"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt, image_bytes, mime_type))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HostedError::Status { status, body });
        }

        reply_text(response.json().await?)
    }
}
