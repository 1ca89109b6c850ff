//! Quote email rendering and transports.
//!
//! The HTML body is rendered from an embedded Tera template. Transports sit behind
//! [`QuoteMailer`]: `log` writes the message to the tracing output, `http` posts it
//! to a mail relay as JSON, `smtp` delivers it through an SMTP server with a
//! plain-text alternative built from the quote summary.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ratecard_core::config::{MailConfig, MailTransport};
use ratecard_core::errors::DeliveryError;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use ratecard_core::{format_exchange_rate, AssembledQuote, QuoteId};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::info;

const TEMPLATE_NAME: &str = "quote_email.html";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait QuoteMailer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, email: &QuoteEmail) -> Result<(), DeliveryError>;
}

/// Writes the message to the log instead of sending it.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl QuoteMailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, email: &QuoteEmail) -> Result<(), DeliveryError> {
        info!(
            event_name = "mail.logged",
            correlation_id = "delivery",
            to = %email.to,
            subject = %email.subject,
            bytes = email.html.len(),
            text_lines = email.text.lines().count(),
            "quote email written to log transport"
        );
        Ok(())
    }
}

pub struct HttpRelayMailer {
    client: Client,
    relay_url: String,
    api_key: SecretString,
}

impl HttpRelayMailer {
    pub fn new(
        relay_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| DeliveryError::Transport(format!("could not build mail client: {error}")))?;
        Ok(Self { client, relay_url: relay_url.into(), api_key })
    }
}

#[async_trait]
impl QuoteMailer for HttpRelayMailer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, email: &QuoteEmail) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.relay_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(email)
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(format!("mail relay request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Transport(format!(
                "mail relay returned {}",
                response.status()
            )));
        }

        info!(
            event_name = "mail.relayed",
            correlation_id = "delivery",
            to = %email.to,
            status = %response.status(),
            "quote email accepted by relay"
        );
        Ok(())
    }
}

/// How the SMTP connection is secured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS from the first byte (SMTPS).
    Wrapper,
    /// Plain connection upgraded with STARTTLS when the server offers it.
    Opportunistic,
}

impl SmtpSecurity {
    pub const IMPLICIT_TLS_PORT: u16 = 465;

    pub fn for_port(port: u16) -> Self {
        if port == Self::IMPLICIT_TLS_PORT {
            Self::Wrapper
        } else {
            Self::Opportunistic
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    security: SmtpSecurity,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, SecretString)>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let security = SmtpSecurity::for_port(port);
        let smtp_error =
            |error: lettre::transport::smtp::Error| DeliveryError::Transport(format!("smtp setup failed: {error}"));

        let mut builder = match security {
            SmtpSecurity::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(host).map_err(smtp_error)?,
            SmtpSecurity::Opportunistic => {
                let parameters = TlsParameters::new(host.to_owned()).map_err(smtp_error)?;
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                    .tls(Tls::Opportunistic(parameters))
            }
        };
        builder = builder.port(port).timeout(Some(timeout));
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password.expose_secret().to_owned()));
        }

        Ok(Self { transport: builder.build(), security })
    }

    pub fn security(&self) -> SmtpSecurity {
        self.security
    }

    fn message(email: &QuoteEmail) -> Result<Message, DeliveryError> {
        let from: Mailbox = email
            .from
            .parse()
            .map_err(|error| DeliveryError::Transport(format!("invalid sender address: {error}")))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|error| DeliveryError::Transport(format!("invalid recipient address: {error}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(email.text.clone(), email.html.clone()))
            .map_err(|error| DeliveryError::Transport(format!("could not build message: {error}")))
    }
}

#[async_trait]
impl QuoteMailer for SmtpMailer {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &QuoteEmail) -> Result<(), DeliveryError> {
        let message = Self::message(email)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|error| DeliveryError::Transport(format!("smtp delivery failed: {error}")))?;

        info!(
            event_name = "mail.smtp_sent",
            correlation_id = "delivery",
            to = %email.to,
            code = %response.code(),
            "quote email accepted by smtp server"
        );
        Ok(())
    }
}

/// Builds the configured transport.
pub fn mailer_from_config(
    config: &MailConfig,
    timeout: Duration,
) -> Result<Box<dyn QuoteMailer>, DeliveryError> {
    match config.transport {
        MailTransport::Log => Ok(Box::new(LogMailer)),
        MailTransport::Http => {
            let relay_url = config.relay_url.clone().ok_or_else(|| {
                DeliveryError::Transport("mail.relay_url is required for the http transport".to_owned())
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| {
                DeliveryError::Transport("mail.api_key is required for the http transport".to_owned())
            })?;
            Ok(Box::new(HttpRelayMailer::new(relay_url, api_key, timeout)?))
        }
        MailTransport::Smtp => {
            let host = config.smtp_host.as_deref().filter(|host| !host.trim().is_empty()).ok_or_else(|| {
                DeliveryError::Transport("mail.smtp_host is required for the smtp transport".to_owned())
            })?;
            let credentials = config.smtp_username.clone().zip(config.smtp_password.clone());
            Ok(Box::new(SmtpMailer::new(host, config.smtp_port, credentials, timeout)?))
        }
    }
}

pub struct QuoteEmailRenderer {
    tera: Tera,
    company_name: String,
    from_address: String,
    validity_days: u32,
}

impl QuoteEmailRenderer {
    pub fn new(config: &MailConfig, validity_days: u32) -> Result<Self, DeliveryError> {
        let mut tera = Tera::default();
        // The `.html` name keeps Tera's autoescaping on for user-supplied text.
        tera.add_raw_template(
            TEMPLATE_NAME,
            include_str!("../../../templates/quote_email.html.tera"),
        )
        .map_err(|error| DeliveryError::Template(error.to_string()))?;

        Ok(Self {
            tera,
            company_name: config.company_name.clone(),
            from_address: config.from_address.clone(),
            validity_days,
        })
    }

    pub fn subject(&self, quote: &AssembledQuote) -> String {
        format!(
            "Your Rate Card Quote from {} - {}",
            self.company_name,
            quote.record.calculator_type.label()
        )
    }

    pub fn render(
        &self,
        quote: &AssembledQuote,
        quote_id: Option<QuoteId>,
    ) -> Result<QuoteEmail, DeliveryError> {
        let record = &quote.record;
        let subject = self.subject(quote);

        let mut context = Context::new();
        context.insert("subject", &subject);
        context.insert("company_name", &self.company_name);
        context.insert("calculator_label", record.calculator_type.label());
        context.insert("quote_id", &quote_id.map(|id| id.0));
        context.insert("contact", &record.contact);
        context.insert("labels", &record.labels);
        context.insert("currency", record.currency.as_str());
        context.insert("reference_currency", record.reference_currency.as_str());
        context.insert("exchange_rate", &format_exchange_rate(record.exchange_rate));
        context.insert("converted", &record.is_converted());
        context.insert("formatted_final_rate", &quote.formatted_final_rate);
        context.insert("formatted_base_rate", &quote.formatted_base_rate);
        context.insert("message", &record.message);
        context.insert("validity_days", &self.validity_days);
        context.insert("generated_at", &Utc::now().format("%Y-%m-%d %H:%M UTC").to_string());

        let html = self
            .tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| DeliveryError::Template(error.to_string()))?;

        Ok(QuoteEmail {
            from: self.from_address.clone(),
            to: record.contact.email.clone(),
            subject,
            html,
            text: quote.summary_lines(self.validity_days).join("\n"),
        })
    }
}
