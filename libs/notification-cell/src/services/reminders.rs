// libs/notification-cell/src/services/reminders.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::{Channel, CreateNotificationRequest, NotificationError, NotificationType};
use crate::services::dispatch::NotificationService;

/// How far ahead reminders are sent.
pub const REMINDER_HORIZON_HOURS: i64 = 24;

/// Something a user should be reminded of.
#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub user_id: Uuid,
    pub reference_id: Uuid,
    /// When the referenced event starts.
    pub starts_at: DateTime<Utc>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub channel: Channel,
}

/// Supplies reminders for events starting within a window.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReminderSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn due_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DueReminder>, NotificationError>;
}

pub struct ReminderScheduler {
    notifications: Arc<NotificationService>,
    sources: Vec<Arc<dyn ReminderSource>>,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(notifications: Arc<NotificationService>, interval: Duration) -> Self {
        Self {
            notifications,
            sources: Vec::new(),
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ReminderSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// One sweep. Each referenced item is reminded at most once per
    /// notification type and start time; returns how many reminders were
    /// created.
    pub async fn run_once(&self, now: DateTime<Utc>) -> usize {
        let until = now + chrono::Duration::hours(REMINDER_HORIZON_HOURS);
        let mut created = 0;

        for source in &self.sources {
            let due = match source.due_between(now, until).await {
                Ok(due) => due,
                Err(e) => {
                    error!("Reminder source {} failed: {}", source.name(), e);
                    continue;
                }
            };

            for reminder in due {
                match self.remind(reminder).await {
                    Ok(true) => created += 1,
                    Ok(false) => {}
                    Err(e) => error!("Failed to create {} reminder: {}", source.name(), e),
                }
            }
        }

        if created > 0 {
            info!("Reminder sweep created {} notifications", created);
        }
        created
    }

    async fn remind(&self, reminder: DueReminder) -> Result<bool, NotificationError> {
        if self
            .notifications
            .reminded_for(reminder.reference_id, reminder.notification_type, reminder.starts_at)
            .await?
        {
            debug!("Reminder for {} already sent", reminder.reference_id);
            return Ok(false);
        }

        self.notifications
            .notify_reminder(
                CreateNotificationRequest {
                    user_id: reminder.user_id,
                    notification_type: reminder.notification_type,
                    title: reminder.title,
                    message: reminder.message,
                    channel: reminder.channel,
                    reference_id: Some(reminder.reference_id),
                },
                reminder.starts_at,
            )
            .await?;
        Ok(true)
    }

    /// Runs a sweep every interval until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Reminder scheduler started: {} sources, every {}s",
                self.sources.len(),
                self.interval.as_secs()
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                self.run_once(Utc::now()).await;
            }
        })
    }
}
