use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::timeout;
use uuid::Uuid;

use realtime_cell::handlers::authorize_topic;
use realtime_cell::*;
use shared_models::auth::{Role, User};

fn user(role: Role) -> User {
    User { id: Uuid::new_v4(), role, name: None, issued_at: None }
}

#[tokio::test]
async fn test_hub_starts_without_topics() {
    let hub = RealtimeHub::new();
    assert!(hub.active_topics().await.is_empty());
}

#[tokio::test]
async fn test_events_reach_only_their_topic() {
    let hub = RealtimeHub::new();
    let procedure_a = Topic::Procedure(Uuid::new_v4());
    let procedure_b = Topic::Procedure(Uuid::new_v4());

    let mut rx_a = hub.subscribe(procedure_a).await;
    let mut rx_b = hub.subscribe(procedure_b).await;

    let delivered = hub
        .publish(procedure_a, EventKind::ProcedureUpdated, &json!({ "progress": 25 }))
        .await;
    assert_eq!(delivered, 1);

    let message = timeout(Duration::from_secs(1), rx_a.recv())
        .await
        .expect("subscriber on topic A should receive the event")
        .unwrap();
    let event: Value = serde_json::from_str(&message).unwrap();
    assert_eq!(event["event"], "procedureUpdated");
    assert_eq!(event["topic"], procedure_a.to_string());
    assert_eq!(event["data"]["progress"], 25);

    assert!(rx_b.try_recv().is_err(), "topic B must not see topic A events");
}

#[tokio::test]
async fn test_publish_without_subscribers_is_dropped() {
    let hub = RealtimeHub::new();
    let topic = Topic::Session(Uuid::new_v4());

    let delivered = hub.publish(topic, EventKind::SessionCreated, &json!({})).await;
    assert_eq!(delivered, 0);
    assert!(hub.active_topics().await.is_empty());
}

#[tokio::test]
async fn test_idle_topics_are_pruned_after_unsubscribe() {
    let hub = RealtimeHub::new();
    let topic = Topic::Room(Uuid::new_v4());

    let receiver = hub.subscribe(topic).await;
    assert_eq!(hub.active_topics().await, vec![topic]);

    drop(receiver);
    hub.publish(topic, EventKind::SessionDeleted, &json!({})).await;
    assert!(hub.active_topics().await.is_empty());
}

#[tokio::test]
async fn test_cloned_hub_shares_channels() {
    let hub = RealtimeHub::new();
    let cloned = hub.clone();
    let topic = Topic::User(Uuid::new_v4());

    let mut receiver = hub.subscribe(topic).await;
    cloned.publish(topic, EventKind::NotificationCreated, &json!({ "title": "Reminder" })).await;

    let message = timeout(Duration::from_secs(1), receiver.recv()).await.unwrap().unwrap();
    assert!(message.contains("notificationCreated"));
}

#[test]
fn test_topic_authorization() {
    let patient = user(Role::Patient);
    let therapist = user(Role::Therapist);

    assert!(authorize_topic(&patient, &Topic::User(patient.id)).is_ok());
    assert!(authorize_topic(&patient, &Topic::User(Uuid::new_v4())).is_err());
    assert!(authorize_topic(&patient, &Topic::Procedure(Uuid::new_v4())).is_err());
    assert!(authorize_topic(&therapist, &Topic::Procedure(Uuid::new_v4())).is_ok());
}
