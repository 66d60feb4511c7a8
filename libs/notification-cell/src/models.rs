// libs/notification-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::{Document, StoreError};
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    PreTherapy,
    PostTherapy,
    DailyTip,
    AppointmentReminder,
    General,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationType::PreTherapy => "pre-therapy",
            NotificationType::PostTherapy => "post-therapy",
            NotificationType::DailyTip => "daily-tip",
            NotificationType::AppointmentReminder => "appointment-reminder",
            NotificationType::General => "general",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Email,
    #[default]
    InApp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Read,
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Read => "read",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub channel: Channel,
    pub status: NotificationStatus,
    /// Appointment or session this notification is about, if any.
    pub reference_id: Option<Uuid>,
    /// Start of the event a reminder was sent for.
    #[serde(default)]
    pub remind_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub channel: Channel,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyTipRequest {
    /// Only this user; every patient when absent.
    pub user_id: Option<Uuid>,
    pub channel: Option<Channel>,
}

/// Rendered email ready for a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Notification is {status} and cannot be {action}")]
    InvalidStatusTransition { status: NotificationStatus, action: &'static str },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email transport error: {0}")]
    Transport(String),

    #[error("Recipient lookup failed: {0}")]
    Recipient(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for NotificationError {
    fn from(err: StoreError) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            NotificationError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            NotificationError::Transport(msg) => AppError::ExternalService(msg),
            NotificationError::Recipient(msg) | NotificationError::DatabaseError(msg) => {
                AppError::Database(msg)
            }
        }
    }
}
