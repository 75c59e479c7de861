//! HTTP client for the document submission endpoint.
//!
//! The endpoint takes one POST shape, `{"input": {...}}`, where the inner
//! object names a `subject` and carries base64 image payloads. Responses
//! are returned as raw JSON; interpreting the extracted fields is the
//! caller's business.

use crate::error::{AppError, Result};
use crate::settings::Settings;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const EXTRACT_DOCUMENT_SUBJECT: &str = "extract_document_fields";
const VERIFY_RECEIPT_SUBJECT: &str = "verify_receipt";

#[derive(Serialize)]
struct SubmissionBody<P: Serialize> {
    input: P,
}

#[derive(Serialize)]
struct ExtractDocumentInput<'a> {
    subject: &'static str,
    base64_image: &'a str,
}

#[derive(Serialize)]
struct VerifyReceiptInput<'a> {
    subject: &'static str,
    receipt_image: &'a str,
    specimen_images: &'a [String],
}

/// Client bound to one endpoint URL with a fixed request timeout.
#[derive(Debug)]
pub struct SubmissionClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl SubmissionClient {
    /// Builds a client from persisted settings.
    ///
    /// Fails when `api_endpoint` is empty or unparsable, so callers get a
    /// settings error before any request goes out.
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::from_parts(&settings.api_endpoint, settings.api_timeout_ms)
    }

    /// Builds a client from an explicit endpoint and timeout.
    pub fn from_parts(endpoint: &str, timeout_ms: u64) -> Result<Self> {
        if endpoint.trim().is_empty() {
            return Err(AppError::settings("api_endpoint is not configured"));
        }
        let endpoint = Url::parse(endpoint).map_err(|err| {
            AppError::settings(format!("api_endpoint is not a valid URL: {err}"))
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self { http, endpoint })
    }

    /// The URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Submits a document image for field extraction.
    pub async fn extract_document(&self, base64_image: &str) -> Result<Value> {
        let body = SubmissionBody {
            input: ExtractDocumentInput {
                subject: EXTRACT_DOCUMENT_SUBJECT,
                base64_image,
            },
        };
        self.post(EXTRACT_DOCUMENT_SUBJECT, &body).await
    }

    /// Submits a receipt image for verification against stored specimens.
    pub async fn verify_receipt(
        &self,
        receipt_image: &str,
        specimen_images: &[String],
    ) -> Result<Value> {
        let body = SubmissionBody {
            input: VerifyReceiptInput {
                subject: VERIFY_RECEIPT_SUBJECT,
                receipt_image,
                specimen_images,
            },
        };
        self.post(VERIFY_RECEIPT_SUBJECT, &body).await
    }

    async fn post<P: Serialize>(
        &self,
        subject: &'static str,
        body: &SubmissionBody<P>,
    ) -> Result<Value> {
        debug!(subject, endpoint = %self.endpoint, "posting submission");
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::submission(format!(
                "endpoint returned status {status}"
            )));
        }
        info!(subject, status = status.as_u16(), "submission accepted");
        Ok(response.json::<Value>().await?)
    }
}
