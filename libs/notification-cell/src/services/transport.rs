// libs/notification-cell/src/services/transport.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{EmailMessage, NotificationError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Posts messages as JSON to an HTTP mail relay using basic auth.
pub struct HttpEmailTransport {
    client: Client,
    api_url: String,
    user: String,
    pass: String,
}

impl HttpEmailTransport {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_endpoint(&config.email_api_url, &config.email_user, &config.email_pass)
    }

    pub fn with_endpoint(api_url: &str, user: &str, pass: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        debug!("Sending email '{}' to {} via {}", message.subject, message.to, self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(message)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Mail relay rejected message: {} - {}", status, body);
            return Err(NotificationError::Transport(format!("HTTP {}: {}", status, body)));
        }

        info!("Email '{}' delivered to relay for {}", message.subject, message.to);
        Ok(())
    }
}

/// Used when no mail relay is configured: the message is logged and
/// counted as sent.
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!("Email (not delivered, no relay configured) to {}: {}", message.to, message.subject);
        Ok(())
    }
}

pub fn transport_from_config(config: &AppConfig) -> Arc<dyn EmailTransport> {
    if config.is_email_configured() {
        Arc::new(HttpEmailTransport::new(config))
    } else {
        Arc::new(LogTransport)
    }
}
