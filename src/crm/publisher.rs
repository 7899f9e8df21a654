use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{error, info};

use crate::crm::client::{AttachmentRef, CrmClient};
use crate::models::{Business, Result};
use crate::report::compiler::CompiledReport;

const FINGERPRINT_LEN: usize = 12;

/// Outcome of one publish attempt. Failures carry enough context for a
/// manual retry and never block other businesses.
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Uploaded(AttachmentRef),
    AlreadyPresent,
    Failed(String),
}

impl std::fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishOutcome::Uploaded(attachment) => write!(f, "published ({})", attachment.file_name),
            PublishOutcome::AlreadyPresent => write!(f, "already present"),
            PublishOutcome::Failed(reason) => write!(f, "publish failed: {}", reason),
        }
    }
}

pub struct ReportPublisher<'a> {
    crm: &'a dyn CrmClient,
}

impl<'a> ReportPublisher<'a> {
    pub fn new(crm: &'a dyn CrmClient) -> Self {
        Self { crm }
    }

    /// Ensure exactly one up-to-date copy of the report is attached to the
    /// business's CRM lead. The fingerprint check and the upload are separate
    /// CRM calls: a concurrent publish for the same lead can add one extra
    /// copy, which the next run's check reports as already present.
    pub async fn publish(&self, business: &Business, report: &CompiledReport) -> PublishOutcome {
        let Some(lead_id) = business.crm_lead_id.as_deref() else {
            return PublishOutcome::Failed("no CRM lead id on record".to_string());
        };

        let fingerprint = match fingerprint_file(&report.path).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                error!(
                    "🔥 Could not fingerprint report for business {} (lead {}): {}",
                    business.id, lead_id, e
                );
                return PublishOutcome::Failed(format!("fingerprint failed: {}", e));
            }
        };
        let file_name = attachment_file_name(&business.name, &fingerprint);

        match self.crm.find_attachment(lead_id, &fingerprint).await {
            Ok(true) => {
                info!(
                    "📎 Report already present for {} (lead {}, fingerprint {})",
                    business.name, lead_id, fingerprint
                );
                PublishOutcome::AlreadyPresent
            }
            Ok(false) => match self.crm.upload_attachment(lead_id, &report.path, &file_name).await {
                Ok(attachment) => {
                    info!("📤 Uploaded report for {} to lead {}", business.name, lead_id);
                    PublishOutcome::Uploaded(attachment)
                }
                Err(e) => {
                    error!(
                        "🔥 Upload failed for business {} (lead {}): {}",
                        business.id, lead_id, e
                    );
                    PublishOutcome::Failed(format!("upload failed: {}", e))
                }
            },
            Err(e) => {
                error!(
                    "🔥 Attachment lookup failed for business {} (lead {}): {}",
                    business.id, lead_id, e
                );
                PublishOutcome::Failed(format!("attachment lookup failed: {}", e))
            }
        }
    }
}

/// Stable content fingerprint: leading hex of the artifact's SHA-256.
pub async fn fingerprint_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let digest = Sha256::digest(&bytes);
    let mut fingerprint = hex::encode(digest);
    fingerprint.truncate(FINGERPRINT_LEN);
    Ok(fingerprint)
}

pub fn attachment_file_name(business_name: &str, fingerprint: &str) -> String {
    format!("Website Report - {} [{}].html", business_name, fingerprint)
}
