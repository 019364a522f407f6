//! Report delivery by email

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub mod chunked;
pub mod smtp;

pub use chunked::{pack_chunks, ChunkedMailer, EMAIL_BODY, REPORT_EMAIL_SUBJECT};
pub use smtp::SmtpMailer;

/// One message with a single file attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Attached under its base name
    pub attachment: PathBuf,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}
