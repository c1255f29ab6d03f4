use crate::{config::SmtpConfiguration, outbound_email::OutboundEmail};
use anyhow::bail;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

/// Port on which SMTP servers expect TLS from the first byte rather than via STARTTLS.
const SMTPS_PORT: u16 = 465;

/// Delivers a composed email to the SMTP relay.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        email: OutboundEmail,
        configuration: &SmtpConfiguration,
    ) -> anyhow::Result<()>;
}

/// Opens a fresh connection to the relay for every message. The connection is closed when the
/// transport is dropped at the end of [`MailTransport::send`], whatever the outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct LettreMailTransport;

#[async_trait]
impl MailTransport for LettreMailTransport {
    async fn send(
        &self,
        email: OutboundEmail,
        configuration: &SmtpConfiguration,
    ) -> anyhow::Result<()> {
        let message = build_message(email)?;
        let mailer = build_mailer(configuration)?;
        let response = mailer.send(message).await?;
        if !response.is_positive() {
            bail!("SMTP server rejected message with code {}", response.code());
        }
        Ok(())
    }
}

fn build_message(email: OutboundEmail) -> anyhow::Result<Message> {
    Ok(Message::builder()
        .from(Mailbox::new(None, email.from))
        .reply_to(Mailbox::new(None, email.reply_to))
        .to(Mailbox::new(None, email.to))
        .subject(email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body)?)
}

fn build_mailer(
    configuration: &SmtpConfiguration,
) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
    let SmtpConfiguration {
        host,
        port,
        enable_tls,
        ..
    } = configuration;
    info!("Connecting to SMTP server {host}:{port} (TLS: {enable_tls})");
    let mut builder = if !enable_tls {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host.as_str())
    } else if *port == SMTPS_PORT {
        AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
    }
    .port(*port);

    if let Some(timeout) = configuration.timeout {
        builder = builder.timeout(Some(timeout));
    }

    if let Some((username, password)) = configuration.credentials() {
        if !enable_tls {
            warn!("Sending SMTP credentials to {host} over a connection without TLS");
        }
        builder = builder
            .credentials(Credentials::new(username.into(), password.into()))
            .authentication(vec![Mechanism::Plain, Mechanism::Login]);
    }

    Ok(builder.build())
}
