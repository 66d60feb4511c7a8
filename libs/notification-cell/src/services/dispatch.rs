// libs/notification-cell/src/services/dispatch.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth_cell::AuthService;
use realtime_cell::{EventKind, RealtimeHub, Topic};
use shared_config::AppConfig;
use shared_database::{Collection, DocumentStore, Filter};
use shared_models::auth::Role;

use crate::models::{
    Channel, CreateNotificationRequest, DailyTipRequest, Notification, NotificationError,
    NotificationStatus, NotificationType,
};
use crate::services::templates::{pick_daily_tip, render_email};
use crate::services::transport::EmailTransport;

pub struct NotificationService {
    notifications: Arc<dyn Collection<Notification>>,
    accounts: Arc<AuthService>,
    transport: Arc<dyn EmailTransport>,
    hub: Arc<RealtimeHub>,
    email_from: String,
}

impl NotificationService {
    pub fn new(
        store: &DocumentStore,
        accounts: Arc<AuthService>,
        transport: Arc<dyn EmailTransport>,
        hub: Arc<RealtimeHub>,
        config: &AppConfig,
    ) -> Self {
        Self {
            notifications: store.collection::<Notification>(),
            accounts,
            transport,
            hub,
            email_from: config.email_from.clone(),
        }
    }

    pub async fn create(&self, request: CreateNotificationRequest) -> Result<Notification, NotificationError> {
        self.insert(request, None).await
    }

    async fn insert(
        &self,
        request: CreateNotificationRequest,
        remind_for: Option<DateTime<Utc>>,
    ) -> Result<Notification, NotificationError> {
        if request.title.trim().is_empty() {
            return Err(NotificationError::ValidationError("Title is required".to_string()));
        }
        if request.message.trim().is_empty() {
            return Err(NotificationError::ValidationError("Message is required".to_string()));
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            notification_type: request.notification_type,
            title: request.title.trim().to_string(),
            message: request.message.trim().to_string(),
            channel: request.channel,
            status: NotificationStatus::Pending,
            reference_id: request.reference_id,
            remind_for,
            sent_at: None,
            read_at: None,
            error: None,
            created_at: Utc::now(),
        };

        let notification = self.notifications.insert(notification).await?;
        debug!(
            "Created {} notification {} for user {}",
            notification.notification_type, notification.id, notification.user_id
        );

        self.hub
            .publish(Topic::User(notification.user_id), EventKind::NotificationCreated, &notification)
            .await;
        Ok(notification)
    }

    /// Delivers a pending (or previously failed) notification. A transport
    /// failure is recorded on the notification, not returned as an error.
    pub async fn send(&self, notification_id: Uuid) -> Result<Notification, NotificationError> {
        let mut notification = self.get(notification_id).await?;

        if !matches!(notification.status, NotificationStatus::Pending | NotificationStatus::Failed) {
            return Err(NotificationError::InvalidStatusTransition {
                status: notification.status,
                action: "sent",
            });
        }

        let outcome = match notification.channel {
            Channel::InApp => Ok(()),
            Channel::Email => self.deliver_email(&notification).await,
        };

        let now = Utc::now();
        match outcome {
            Ok(()) => {
                notification.status = NotificationStatus::Sent;
                notification.sent_at = Some(now);
                notification.error = None;
            }
            Err(e) => {
                warn!("Notification {} could not be delivered: {}", notification.id, e);
                notification.status = NotificationStatus::Failed;
                notification.sent_at = Some(now);
                notification.error = Some(e.to_string());
            }
        }

        Ok(self.notifications.update(notification).await?)
    }

    /// Creates and immediately sends a notification. Used by workflows whose
    /// own state change must not depend on delivery.
    pub async fn notify(&self, request: CreateNotificationRequest) -> Result<Notification, NotificationError> {
        let notification = self.create(request).await?;
        self.send(notification.id).await
    }

    /// Like [`notify`](Self::notify), for a reminder about an event starting
    /// at `starts_at`.
    pub async fn notify_reminder(
        &self,
        request: CreateNotificationRequest,
        starts_at: DateTime<Utc>,
    ) -> Result<Notification, NotificationError> {
        let notification = self.insert(request, Some(starts_at)).await?;
        self.send(notification.id).await
    }

    pub async fn mark_read(&self, notification_id: Uuid) -> Result<Notification, NotificationError> {
        let mut notification = self.get(notification_id).await?;

        match notification.status {
            NotificationStatus::Read => return Ok(notification),
            NotificationStatus::Pending | NotificationStatus::Sent => {}
            NotificationStatus::Failed => {
                return Err(NotificationError::InvalidStatusTransition {
                    status: notification.status,
                    action: "marked read",
                });
            }
        }

        notification.status = NotificationStatus::Read;
        notification.read_at = Some(Utc::now());
        let notification = self.notifications.update(notification).await?;

        self.hub
            .publish(Topic::User(notification.user_id), EventKind::NotificationRead, &notification)
            .await;
        Ok(notification)
    }

    pub async fn delete(&self, notification_id: Uuid) -> Result<(), NotificationError> {
        if !self.notifications.delete(notification_id).await? {
            return Err(NotificationError::NotFound);
        }
        info!("Notification {} deleted", notification_id);
        Ok(())
    }

    pub async fn get(&self, notification_id: Uuid) -> Result<Notification, NotificationError> {
        self.notifications
            .get(notification_id)
            .await?
            .ok_or(NotificationError::NotFound)
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>, NotificationError> {
        let mut notifications = self
            .notifications
            .find(&Filter::new().eq("user_id", user_id))
            .await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    /// Whether a reminder of this type was already sent for the referenced
    /// appointment or session starting at `starts_at`. A moved start time
    /// counts as a new event.
    pub async fn reminded_for(
        &self,
        reference_id: Uuid,
        notification_type: NotificationType,
        starts_at: DateTime<Utc>,
    ) -> Result<bool, NotificationError> {
        let filter = Filter::new()
            .eq("reference_id", reference_id)
            .eq("type", notification_type)
            .eq("remind_for", starts_at);
        Ok(!self.notifications.find(&filter).await?.is_empty())
    }

    /// Sends one tip to the given user, or to every patient.
    pub async fn send_daily_tip(&self, request: DailyTipRequest) -> Result<Vec<Notification>, NotificationError> {
        let recipients = match request.user_id {
            Some(user_id) => vec![user_id],
            None => self
                .accounts
                .users_with_role(Role::Patient)
                .await
                .map_err(|e| NotificationError::Recipient(e.to_string()))?
                .into_iter()
                .map(|user| user.id)
                .collect(),
        };

        let tip = pick_daily_tip();
        let channel = request.channel.unwrap_or_default();
        info!("Sending daily tip to {} users", recipients.len());

        let mut sent = Vec::with_capacity(recipients.len());
        for user_id in recipients {
            let notification = self
                .notify(CreateNotificationRequest {
                    user_id,
                    notification_type: NotificationType::DailyTip,
                    title: "Daily wellness tip".to_string(),
                    message: tip.to_string(),
                    channel,
                    reference_id: None,
                })
                .await?;
            sent.push(notification);
        }
        Ok(sent)
    }

    async fn deliver_email(&self, notification: &Notification) -> Result<(), NotificationError> {
        let recipient = self
            .accounts
            .get_user(notification.user_id)
            .await
            .map_err(|e| NotificationError::Recipient(e.to_string()))?
            .ok_or_else(|| NotificationError::Recipient(format!("No account for user {}", notification.user_id)))?;

        let message = render_email(notification, &self.email_from, &recipient.email);
        self.transport.send(&message).await
    }
}
