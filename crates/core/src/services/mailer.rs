//! Outbound mail: template rendering, provider transport and retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gophersocial_common::{AppError, AppResult};
use tracing::{info, warn};

/// Display name on every outgoing message.
pub const FROM_NAME: &str = "GopherSocial";

/// Attempts made before a send is reported as failed.
pub const MAX_RETRIES: u32 = 3;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

const USER_INVITATION_TEMPLATE: &str = include_str!("../../templates/user_invitation.tmpl");

/// A rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    /// HTML body.
    pub body: String,
    /// When set the provider accepts the message without delivering it.
    pub sandbox: bool,
}

/// Mail provider.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Hand one message to the provider and return its status code.
    async fn deliver(&self, message: &MailMessage) -> AppResult<u16>;
}

/// SendGrid v3 HTTP transport.
#[derive(Clone)]
pub struct SendGridTransport {
    http_client: reqwest::Client,
    api_key: String,
    from_email: String,
}

impl SendGridTransport {
    #[must_use]
    pub fn new(api_key: &str, from_email: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
        }
    }

    fn payload(&self, message: &MailMessage) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{
                "to": [{"email": message.to_email, "name": message.to_name}]
            }],
            "from": {
                "email": self.from_email,
                "name": FROM_NAME
            },
            "subject": message.subject,
            "content": [
                {"type": "text/html", "value": message.body}
            ],
            "mail_settings": {
                "sandbox_mode": {"enable": message.sandbox}
            }
        })
    }
}

#[async_trait]
impl MailTransport for SendGridTransport {
    async fn deliver(&self, message: &MailMessage) -> AppResult<u16> {
        let response = self
            .http_client
            .post(SENDGRID_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("SendGrid request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::ExternalService(format!(
                "SendGrid returned {status}: {error_text}"
            )))
        }
    }
}

/// Renders templates and sends them with linear backoff between attempts.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    max_retries: u32,
    backoff_step: Duration,
}

impl Mailer {
    /// Mailer with [`MAX_RETRIES`] attempts and a one-second backoff step.
    #[must_use]
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self {
            transport,
            max_retries: MAX_RETRIES,
            backoff_step: Duration::from_secs(1),
        }
    }

    /// Override the backoff step. The wait after attempt `n` is `n * step`.
    #[must_use]
    pub const fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// Send the account activation mail.
    pub async fn send_invitation(
        &self,
        username: &str,
        email: &str,
        activation_url: &str,
        sandbox: bool,
    ) -> AppResult<u16> {
        let (subject, body) = render(
            USER_INVITATION_TEMPLATE,
            &[("username", username), ("activation_url", activation_url)],
        )?;

        self.send(&MailMessage {
            to_name: username.to_string(),
            to_email: email.to_string(),
            subject,
            body,
            sandbox,
        })
        .await
    }

    /// Deliver a message, retrying transport failures.
    pub async fn send(&self, message: &MailMessage) -> AppResult<u16> {
        for attempt in 1..=self.max_retries {
            match self.transport.deliver(message).await {
                Ok(status) => {
                    info!(to = %message.to_email, status, attempt, "Email sent");
                    return Ok(status);
                }
                Err(e) => {
                    warn!(to = %message.to_email, attempt, error = %e, "Email send attempt failed");
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.backoff_step * attempt).await;
                    }
                }
            }
        }

        Err(AppError::ExternalService(format!(
            "failed to send email after {} attempts",
            self.max_retries
        )))
    }
}

/// Split a template into its `[subject]` and `[body]` sections and fill
/// `{{name}}` placeholders with HTML-escaped values.
fn render(template: &str, vars: &[(&str, &str)]) -> AppResult<(String, String)> {
    let missing = || AppError::Internal("mail template needs [subject] and [body]".to_string());

    let rest = template
        .split_once("[subject]")
        .map(|(_, rest)| rest)
        .ok_or_else(missing)?;
    let (subject, body) = rest.split_once("[body]").ok_or_else(missing)?;

    let fill = |section: &str| {
        vars.iter()
            .fold(section.trim().to_string(), |text, (name, value)| {
                text.replace(&format!("{{{{{name}}}}}"), &escape_html(value))
            })
    };

    Ok((fill(subject), fill(body)))
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
