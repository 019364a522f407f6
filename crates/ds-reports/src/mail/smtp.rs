//! SMTP delivery through lettre

use super::{MailSender, OutgoingMail};
use crate::archive::base_name;
use crate::config::EmailConfig;
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Transport for `config`; STARTTLS and login follow `use_tls` and `use_auth`
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
        };
        let mut builder = builder.port(config.smtp_port);

        if config.use_auth {
            match (&config.username, &config.password) {
                (Some(username), Some(password)) => {
                    let credentials = Credentials::new(username.clone(), password.clone());
                    builder = builder.credentials(credentials);
                },
                _ => {
                    return Err(ReportError::config(
                        "email.use_auth requires email.username and email.password",
                    ))
                },
            }
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

/// Build the MIME message for `mail`
pub fn build_message(mail: &OutgoingMail) -> Result<Message> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&mail.from)?)
        .subject(mail.subject.as_str())
        .date_now();
    for to in &mail.to {
        builder = builder.to(parse_mailbox(to)?);
    }

    let content_type = ContentType::parse("application/zip")
        .map_err(|e| ReportError::mail(format!("bad content type: {}", e)))?;
    let content = std::fs::read(&mail.attachment)?;
    let attachment = Attachment::new(base_name(&mail.attachment)).body(content, content_type);

    let message = builder.multipart(
        MultiPart::mixed()
            .singlepart(SinglePart::plain(mail.body.clone()))
            .singlepart(attachment),
    )?;
    Ok(message)
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| ReportError::mail(format!("invalid address '{}': {}", address, e)))
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(mail)?;
        let response = self.transport.send(message).await?;
        debug!("SMTP accepted message: {:?}", response.code());
        Ok(())
    }
}
