pub mod client;
pub mod publisher;

pub use client::{AttachmentRef, CrmClient, HttpCrmClient};
pub use publisher::{PublishOutcome, ReportPublisher};
