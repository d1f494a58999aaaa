//! Payment notifications.
//!
//! Notifications are best-effort: they are sent after the payment has been
//! committed, and a failure here is logged by the caller and never undoes
//! the payment.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::models::notification::PaymentNotification;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail provider answered with status {0}")]
    Rejected(u16),

    #[error("notification timed out")]
    Timeout,

    #[error("invalid mail endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Delivers payment notifications to account owners.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &PaymentNotification) -> Result<(), NotifyError>;
}

/// Sends e-mail through the Mailgun HTTP API.
///
/// # Request
///
/// `POST {api_base}/{domain}/messages` as an HTML form with basic auth
/// `api:<api key>`.
pub struct MailgunNotifier {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    from: String,
}

impl MailgunNotifier {
    pub fn new(
        api_base: &str,
        domain: &str,
        api_key: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let base = validate_api_base(api_base)?;
        let endpoint = base
            .join(&format!("{domain}/messages"))
            .map_err(|_| NotifyError::InvalidEndpoint("Invalid mail domain".to_string()))?;

        // Requests never outlive the caller's own timeout
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Notifier for MailgunNotifier {
    async fn notify(&self, notification: &PaymentNotification) -> Result<(), NotifyError> {
        let subject = notification.subject();
        let html = notification.html();

        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.from.as_str()),
                ("to", notification.to.as_str()),
                ("subject", subject.as_str()),
                ("html", html.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        tracing::info!(
            to = %notification.to,
            card = %notification.card_last4,
            "payment notification sent"
        );
        Ok(())
    }
}

/// Used when no mail provider is configured: records the notification in the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &PaymentNotification) -> Result<(), NotifyError> {
        tracing::info!(
            to = %notification.to,
            card = %notification.card_last4,
            amount = %notification.amount,
            balance = %notification.balance,
            "payment notification (mail delivery not configured)"
        );
        Ok(())
    }
}

/// Validate the mail API base URL.
///
/// # Rules
///
/// - Must be valid URL
/// - Must be HTTPS (HTTP localhost allowed for development)
///
/// The returned URL always ends with `/` so path segments can be joined onto it.
fn validate_api_base(url: &str) -> Result<Url, NotifyError> {
    let parsed = Url::parse(&format!("{}/", url.trim_end_matches('/')))
        .map_err(|_| NotifyError::InvalidEndpoint("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" => {
            // Allow HTTP for localhost/127.0.0.1 (testing)
            if parsed.host_str() == Some("localhost") || parsed.host_str() == Some("127.0.0.1") {
                Ok(parsed)
            } else {
                Err(NotifyError::InvalidEndpoint(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(NotifyError::InvalidEndpoint(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://api.mailgun.net/v3")]
    #[case("https://api.eu.mailgun.net/v3/")]
    #[case("http://localhost:8025")]
    #[case("http://127.0.0.1:8025/v3")]
    fn accepts_secure_or_local_bases(#[case] base: &str) {
        assert!(validate_api_base(base).is_ok());
    }

    #[rstest]
    #[case("http://mail.example.com/v3")]
    #[case("ftp://api.mailgun.net")]
    #[case("not a url")]
    fn rejects_other_bases(#[case] base: &str) {
        assert!(matches!(
            validate_api_base(base),
            Err(NotifyError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn endpoint_keeps_api_version_path() {
        let notifier = MailgunNotifier::new(
            "https://api.mailgun.net/v3",
            "mg.example.com",
            "key".to_string(),
            "noreply@bank.local".to_string(),
            Duration::from_secs(10),
        )
        .unwrap();

        assert_eq!(
            notifier.endpoint.as_str(),
            "https://api.mailgun.net/v3/mg.example.com/messages"
        );
    }
}
