use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::models::Result;

/// Handle to an attachment created on a CRM lead.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub id: String,
    pub file_name: String,
}

/// The two CRM operations the publisher needs. Authentication, token
/// refresh and general record CRUD live in the CRM system itself.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Whether any attachment on the lead carries this fingerprint in its
    /// file name.
    async fn find_attachment(&self, lead_id: &str, fingerprint: &str) -> Result<bool>;

    async fn upload_attachment(
        &self,
        lead_id: &str,
        file_path: &Path,
        file_name: &str,
    ) -> Result<AttachmentRef>;
}

pub struct HttpCrmClient {
    client: Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize, Default)]
struct AttachmentList {
    #[serde(default)]
    data: Vec<AttachmentEntry>,
}

#[derive(Debug, Deserialize)]
struct AttachmentEntry {
    #[serde(rename = "File_Name")]
    file_name: Option<String>,
}

impl HttpCrmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CRM_API_BASE_URL")
            .map_err(|_| "CRM_API_BASE_URL is not set")?
            .trim_end_matches('/')
            .to_string();
        let access_token =
            std::env::var("CRM_ACCESS_TOKEN").map_err(|_| "CRM_ACCESS_TOKEN is not set")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            client,
            base_url,
            access_token,
        })
    }

    fn attachments_url(&self, lead_id: &str) -> String {
        format!("{}/Leads/{}/Attachments", self.base_url, lead_id)
    }
}

#[async_trait]
impl CrmClient for HttpCrmClient {
    async fn find_attachment(&self, lead_id: &str, fingerprint: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.attachments_url(lead_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        // Leads without attachments come back empty-bodied.
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(format!("CRM attachment list failed: {}", response.status()).into());
        }

        let list: AttachmentList = response.json().await.unwrap_or_default();
        let found = list
            .data
            .iter()
            .filter_map(|entry| entry.file_name.as_deref())
            .any(|name| name.contains(fingerprint));

        debug!(
            "CRM lead {}: fingerprint {} {}",
            lead_id,
            fingerprint,
            if found { "present" } else { "absent" }
        );
        Ok(found)
    }

    async fn upload_attachment(
        &self,
        lead_id: &str,
        file_path: &Path,
        file_name: &str,
    ) -> Result<AttachmentRef> {
        let bytes = tokio::fs::read(file_path).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/html")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.attachments_url(lead_id))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("CRM upload failed: {}", response.status()).into());
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let id = body
            .pointer("/data/0/details/id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(AttachmentRef {
            id,
            file_name: file_name.to_string(),
        })
    }
}
