use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::{AuthService, RegisterRequest};
use notification_cell::*;
use realtime_cell::{RealtimeHub, Topic};
use shared_config::AppConfig;
use shared_database::DocumentStore;
use shared_models::auth::Role;
use shared_utils::test_utils::TestConfig;

struct Fixture {
    service: Arc<NotificationService>,
    accounts: Arc<AuthService>,
    hub: Arc<RealtimeHub>,
}

fn fixture(transport: Arc<dyn EmailTransport>) -> Fixture {
    let config: AppConfig = TestConfig::default().to_app_config();
    let store = DocumentStore::in_memory();
    let hub = Arc::new(RealtimeHub::new());
    let accounts = Arc::new(AuthService::new(&store, &config));
    let service = Arc::new(NotificationService::new(
        &store,
        accounts.clone(),
        transport,
        hub.clone(),
        &config,
    ));
    Fixture { service, accounts, hub }
}

async fn register(accounts: &AuthService, email: &str, role: Role) -> Uuid {
    accounts
        .register(
            RegisterRequest {
                name: "Meera".to_string(),
                email: email.to_string(),
                password: "sesame-oil-1".to_string(),
                role: Some(role),
                phone: None,
            },
            None,
        )
        .await
        .unwrap()
        .user_id
}

fn request(user_id: Uuid, channel: Channel) -> CreateNotificationRequest {
    CreateNotificationRequest {
        user_id,
        notification_type: NotificationType::General,
        title: "Welcome".to_string(),
        message: "Your care plan is ready.".to_string(),
        channel,
        reference_id: None,
    }
}

/// Transport that always fails.
struct BrokenTransport;

#[async_trait]
impl EmailTransport for BrokenTransport {
    async fn send(&self, _message: &EmailMessage) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("relay unreachable".to_string()))
    }
}

#[tokio::test]
async fn test_created_notifications_start_pending() {
    let f = fixture(Arc::new(LogTransport));
    let user_id = Uuid::new_v4();

    let notification = f.service.create(request(user_id, Channel::InApp)).await.unwrap();
    assert_eq!(notification.status, NotificationStatus::Pending);
    assert!(notification.sent_at.is_none());

    let blank = f
        .service
        .create(CreateNotificationRequest { title: " ".to_string(), ..request(user_id, Channel::InApp) })
        .await;
    assert_matches!(blank, Err(NotificationError::ValidationError(_)));
}

#[tokio::test]
async fn test_in_app_send_needs_no_transport() {
    let f = fixture(Arc::new(BrokenTransport));
    let created = f.service.create(request(Uuid::new_v4(), Channel::InApp)).await.unwrap();

    let sent = f.service.send(created.id).await.unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert!(sent.sent_at.is_some());
}

#[tokio::test]
async fn test_email_failure_is_recorded_not_raised() {
    let f = fixture(Arc::new(BrokenTransport));
    let user_id = register(&f.accounts, "meera@clinic.in", Role::Patient).await;

    let notification = f.service.notify(request(user_id, Channel::Email)).await.unwrap();
    assert_eq!(notification.status, NotificationStatus::Failed);
    assert!(notification.error.as_deref().unwrap().contains("relay unreachable"));

    // failed notifications cannot be marked read but can be retried
    assert_matches!(
        f.service.mark_read(notification.id).await,
        Err(NotificationError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn test_email_to_unknown_user_fails_softly() {
    let f = fixture(Arc::new(LogTransport));
    let notification = f.service.notify(request(Uuid::new_v4(), Channel::Email)).await.unwrap();
    assert_eq!(notification.status, NotificationStatus::Failed);
}

#[tokio::test]
async fn test_http_transport_posts_rendered_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpEmailTransport::with_endpoint(&format!("{}/send", server.uri()), "clinic", "secret");
    let f = fixture(Arc::new(transport));
    let user_id = register(&f.accounts, "ravi@clinic.in", Role::Patient).await;

    let notification = f.service.notify(request(user_id, Channel::Email)).await.unwrap();
    assert_eq!(notification.status, NotificationStatus::Sent);

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["to"], "ravi@clinic.in");
    assert_eq!(body["subject"], "AyurSutra update: Welcome");
}

#[tokio::test]
async fn test_http_transport_surfaces_relay_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("mailbox full"))
        .mount(&server)
        .await;

    let transport = HttpEmailTransport::with_endpoint(&server.uri(), "clinic", "secret");
    let message = EmailMessage {
        from: "clinic@x.in".to_string(),
        to: "p@x.in".to_string(),
        subject: "s".to_string(),
        text: "t".to_string(),
        html: "<p>t</p>".to_string(),
    };

    let result = transport.send(&message).await;
    assert_matches!(result, Err(NotificationError::Transport(msg)) if msg.contains("mailbox full"));
}

#[tokio::test]
async fn test_mark_read_is_terminal_and_published() {
    let f = fixture(Arc::new(LogTransport));
    let user_id = Uuid::new_v4();
    let created = f.service.notify(request(user_id, Channel::InApp)).await.unwrap();
    let mut rx = f.hub.subscribe(Topic::User(user_id)).await;

    let read = f.service.mark_read(created.id).await.unwrap();
    assert_eq!(read.status, NotificationStatus::Read);
    assert!(read.read_at.is_some());

    let message = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    let event: Value = serde_json::from_str(&message).unwrap();
    assert_eq!(event["event"], "notificationRead");

    // a read notification cannot be sent again
    assert_matches!(
        f.service.send(created.id).await,
        Err(NotificationError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn test_list_and_delete() {
    let f = fixture(Arc::new(LogTransport));
    let user_id = Uuid::new_v4();
    let first = f.service.create(request(user_id, Channel::InApp)).await.unwrap();
    f.service.create(request(user_id, Channel::InApp)).await.unwrap();
    f.service.create(request(Uuid::new_v4(), Channel::InApp)).await.unwrap();

    assert_eq!(f.service.list_for_user(user_id).await.unwrap().len(), 2);

    f.service.delete(first.id).await.unwrap();
    assert_eq!(f.service.list_for_user(user_id).await.unwrap().len(), 1);
    assert_matches!(f.service.delete(first.id).await, Err(NotificationError::NotFound));
}

#[tokio::test]
async fn test_daily_tip_reaches_every_patient() {
    let f = fixture(Arc::new(LogTransport));
    let a = register(&f.accounts, "a@clinic.in", Role::Patient).await;
    let b = register(&f.accounts, "b@clinic.in", Role::Patient).await;
    register(&f.accounts, "doc@clinic.in", Role::Doctor).await;

    let sent = f.service.send_daily_tip(DailyTipRequest::default()).await.unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|n| n.notification_type == NotificationType::DailyTip));

    let mut users: Vec<Uuid> = sent.iter().map(|n| n.user_id).collect();
    users.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(users, expected);

    let single = f
        .service
        .send_daily_tip(DailyTipRequest { user_id: Some(a), channel: None })
        .await
        .unwrap();
    assert_eq!(single.len(), 1);
}

struct FixedSource {
    reference_id: Uuid,
    user_id: Uuid,
    starts_at: DateTime<Utc>,
}

#[async_trait]
impl ReminderSource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn due_between(
        &self,
        _from: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<DueReminder>, NotificationError> {
        Ok(vec![DueReminder {
            user_id: self.user_id,
            reference_id: self.reference_id,
            starts_at: self.starts_at,
            notification_type: NotificationType::AppointmentReminder,
            title: "Appointment tomorrow".to_string(),
            message: "See you at 10:00.".to_string(),
            channel: Channel::InApp,
        }])
    }
}

#[tokio::test]
async fn test_reminders_are_sent_once_per_reference() {
    let f = fixture(Arc::new(LogTransport));
    let user_id = Uuid::new_v4();
    let scheduler = ReminderScheduler::new(f.service.clone(), Duration::from_secs(60))
        .with_source(Arc::new(FixedSource {
            reference_id: Uuid::new_v4(),
            user_id,
            starts_at: Utc::now() + chrono::Duration::hours(12),
        }));

    assert_eq!(scheduler.run_once(Utc::now()).await, 1);
    assert_eq!(scheduler.run_once(Utc::now()).await, 0);

    let notifications = f.service.list_for_user(user_id).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].notification_type, NotificationType::AppointmentReminder);
    assert_eq!(notifications[0].status, NotificationStatus::Sent);
}

#[tokio::test]
async fn test_moved_event_is_reminded_again() {
    let f = fixture(Arc::new(LogTransport));
    let user_id = Uuid::new_v4();
    let reference_id = Uuid::new_v4();
    let first_start = Utc::now() + chrono::Duration::hours(12);
    let moved_start = first_start + chrono::Duration::hours(2);

    let original = ReminderScheduler::new(f.service.clone(), Duration::from_secs(60))
        .with_source(Arc::new(FixedSource { reference_id, user_id, starts_at: first_start }));
    assert_eq!(original.run_once(Utc::now()).await, 1);

    let moved = ReminderScheduler::new(f.service.clone(), Duration::from_secs(60))
        .with_source(Arc::new(FixedSource { reference_id, user_id, starts_at: moved_start }));
    assert_eq!(moved.run_once(Utc::now()).await, 1);
    assert_eq!(moved.run_once(Utc::now()).await, 0);

    let mut reminded: Vec<_> = f
        .service
        .list_for_user(user_id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|n| n.remind_for)
        .collect();
    reminded.sort();
    assert_eq!(reminded, vec![first_start, moved_start]);
}
