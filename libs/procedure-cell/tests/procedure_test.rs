use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use auth_cell::AuthService;
use notification_cell::{LogTransport, NotificationService, NotificationType};
use procedure_cell::*;
use realtime_cell::{RealtimeHub, Topic};
use scheduling_cell::{
    BookSessionRequest, CreateRoomRequest, SchedulingService, SessionStatus, Slot, TherapySession,
};
use shared_config::AppConfig;
use shared_database::DocumentStore;

struct Fixture {
    procedures: ProcedureService,
    scheduling: Arc<SchedulingService>,
    notifications: Arc<NotificationService>,
    hub: Arc<RealtimeHub>,
}

fn fixture() -> Fixture {
    let config = AppConfig::default();
    let store = DocumentStore::in_memory();
    let hub = Arc::new(RealtimeHub::new());
    let accounts = Arc::new(AuthService::new(&store, &config));
    let notifications = Arc::new(NotificationService::new(
        &store,
        accounts,
        Arc::new(LogTransport),
        hub.clone(),
        &config,
    ));
    let scheduling = Arc::new(SchedulingService::new(&store, hub.clone(), &config));
    let procedures = ProcedureService::new(&store, scheduling.clone(), notifications.clone(), hub.clone());

    Fixture { procedures, scheduling, notifications, hub }
}

fn custom_steps(count: usize) -> Option<Vec<StepTemplate>> {
    Some(
        (1..=count)
            .map(|i| StepTemplate { name: format!("Step {}", i), description: None })
            .collect(),
    )
}

fn create_request(patient_id: Uuid, steps: Option<Vec<StepTemplate>>) -> CreateProcedureRequest {
    CreateProcedureRequest {
        patient_id: Some(patient_id),
        therapist_id: None,
        session_id: None,
        therapy_type: Some("Abhyanga".to_string()),
        steps,
    }
}

fn step(index: usize, status: Option<StepStatus>, reset: bool) -> StepUpdateRequest {
    StepUpdateRequest { step_index: index, status, reset, notes: None }
}

#[tokio::test]
async fn test_default_steps_follow_the_therapy() {
    let f = fixture();
    let therapist = Uuid::new_v4();

    let procedure = f.procedures.create(create_request(Uuid::new_v4(), None), therapist).await.unwrap();
    assert_eq!(procedure.status, ProcedureStatus::Pending);
    assert_eq!(procedure.therapist_id, therapist);
    assert_eq!(procedure.steps[1].name, "Abhyanga");
    assert!(procedure.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn test_progress_scenario_four_steps() {
    let f = fixture();
    let p = f.procedures.create(create_request(Uuid::new_v4(), custom_steps(4)), Uuid::new_v4()).await.unwrap();

    f.procedures.update_step(p.id, step(0, Some(StepStatus::InProgress), false)).await.unwrap();
    let p1 = f.procedures.update_step(p.id, step(0, Some(StepStatus::Completed), false)).await.unwrap();
    assert_eq!(p1.progress(), 25);
    assert_eq!(p1.status, ProcedureStatus::InProgress);

    f.procedures.update_step(p.id, step(1, Some(StepStatus::InProgress), false)).await.unwrap();
    let p2 = f.procedures.update_step(p.id, step(1, Some(StepStatus::Completed), false)).await.unwrap();
    assert_eq!(p2.progress(), 50);
}

#[tokio::test]
async fn test_reset_scenario_leaves_other_steps_untouched() {
    let f = fixture();
    let p = f.procedures.create(create_request(Uuid::new_v4(), custom_steps(4)), Uuid::new_v4()).await.unwrap();

    f.procedures.update_step(p.id, step(0, Some(StepStatus::InProgress), false)).await.unwrap();
    f.procedures.update_step(p.id, step(0, Some(StepStatus::Completed), false)).await.unwrap();
    let before = f.procedures.get(p.id).await.unwrap();

    f.procedures.update_step(p.id, step(2, Some(StepStatus::InProgress), false)).await.unwrap();
    let after = f.procedures.update_step(p.id, step(2, None, true)).await.unwrap();

    assert_eq!(after.steps[2].status, StepStatus::Pending);
    assert_eq!(after.steps[2].elapsed_seconds, 0);
    assert_eq!(after.steps[0], before.steps[0]);
    assert_eq!(after.steps[1], before.steps[1]);
    assert_eq!(after.steps[3], before.steps[3]);
}

#[tokio::test]
async fn test_empty_step_list_has_zero_progress() {
    let f = fixture();
    let p = f.procedures.create(create_request(Uuid::new_v4(), Some(Vec::new())), Uuid::new_v4()).await.unwrap();
    assert_eq!(p.progress(), 0);
    assert!(!p.all_steps_completed());
}

#[tokio::test]
async fn test_step_errors() {
    let f = fixture();
    let p = f.procedures.create(create_request(Uuid::new_v4(), custom_steps(2)), Uuid::new_v4()).await.unwrap();

    let out_of_range = f.procedures.update_step(p.id, step(7, Some(StepStatus::InProgress), false)).await;
    assert_matches!(out_of_range, Err(ProcedureError::StepOutOfRange { index: 7, len: 2 }));

    let nothing = f.procedures.update_step(p.id, step(0, None, false)).await;
    assert_matches!(nothing, Err(ProcedureError::ValidationError(_)));

    let missing = f.procedures.update_step(Uuid::new_v4(), step(0, None, true)).await;
    assert_matches!(missing, Err(ProcedureError::NotFound));
}

#[tokio::test]
async fn test_completion_is_idempotent_and_freezes_steps() {
    let f = fixture();
    let patient = Uuid::new_v4();
    let p = f.procedures.create(create_request(patient, custom_steps(2)), Uuid::new_v4()).await.unwrap();
    f.procedures.update_step(p.id, step(0, Some(StepStatus::InProgress), false)).await.unwrap();

    let first = f.procedures.complete(p.id).await.unwrap();
    assert_eq!(first.status, ProcedureStatus::Completed);
    assert_eq!(first.steps[0].status, StepStatus::Pending);
    assert!(first.end_time.is_some());

    let second = f.procedures.complete(p.id).await.unwrap();
    assert_eq!(second.end_time, first.end_time);

    let frozen = f.procedures.update_step(p.id, step(1, Some(StepStatus::InProgress), false)).await;
    assert_matches!(frozen, Err(ProcedureError::ProcedureCompleted));

    // exactly one post-therapy notification despite two completion calls
    let notes = f.notifications.list_for_user(patient).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].notification_type, NotificationType::PostTherapy);
    assert_eq!(notes[0].reference_id, Some(p.id));
}

#[tokio::test]
async fn test_procedure_for_session_tracks_session_status() {
    let f = fixture();
    let room = f
        .scheduling
        .create_room(CreateRoomRequest {
            name: "Shirodhara-1".to_string(),
            room_type: "shirodhara".to_string(),
            capacity: Some(1),
            is_available: None,
            slots: vec![Slot {
                day_of_week: 1,
                start_time: "09:00".to_string(),
                end_time: "13:00".to_string(),
                max_concurrent: 1,
            }],
        })
        .await
        .unwrap();

    let patient = Uuid::new_v4();
    let therapist = Uuid::new_v4();
    let session = f
        .scheduling
        .book_session(
            BookSessionRequest {
                patient_id: patient,
                practitioner_id: therapist,
                room_id: room.id,
                therapy_type: "Shirodhara".to_string(),
                start_time: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                notes: None,
                appointment_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

    let p = f
        .procedures
        .create(
            CreateProcedureRequest {
                patient_id: None,
                therapist_id: None,
                session_id: Some(session.id),
                therapy_type: None,
                steps: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
    assert_eq!(p.patient_id, patient);
    assert_eq!(p.therapist_id, therapist);
    assert_eq!(p.steps[1].name, "Shirodhara");

    let duplicate = f
        .procedures
        .create(
            CreateProcedureRequest {
                patient_id: None,
                therapist_id: None,
                session_id: Some(session.id),
                therapy_type: None,
                steps: None,
            },
            Uuid::new_v4(),
        )
        .await;
    assert_matches!(duplicate, Err(ProcedureError::AlreadyExists(_)));

    f.procedures.update_step(p.id, step(0, Some(StepStatus::InProgress), false)).await.unwrap();
    assert_eq!(f.scheduling.get_session(session.id).await.unwrap().status, SessionStatus::Ongoing);

    f.procedures.complete(p.id).await.unwrap();
    assert_eq!(f.scheduling.get_session(session.id).await.unwrap().status, SessionStatus::Completed);
}

async fn booked_session(f: &Fixture) -> TherapySession {
    let room = f
        .scheduling
        .create_room(CreateRoomRequest {
            name: "Abhyanga-2".to_string(),
            room_type: "abhyanga".to_string(),
            capacity: Some(1),
            is_available: None,
            slots: vec![Slot {
                day_of_week: 1,
                start_time: "09:00".to_string(),
                end_time: "13:00".to_string(),
                max_concurrent: 1,
            }],
        })
        .await
        .unwrap();

    f.scheduling
        .book_session(
            BookSessionRequest {
                patient_id: Uuid::new_v4(),
                practitioner_id: Uuid::new_v4(),
                room_id: room.id,
                therapy_type: "Abhyanga".to_string(),
                start_time: Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
                notes: None,
                appointment_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_completing_unstarted_procedure_completes_its_session() {
    let f = fixture();
    let session = booked_session(&f).await;
    assert_eq!(session.status, SessionStatus::Scheduled);

    let p = f
        .procedures
        .create(
            CreateProcedureRequest {
                patient_id: None,
                therapist_id: None,
                session_id: Some(session.id),
                therapy_type: None,
                steps: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

    // no step was ever started
    f.procedures.complete(p.id).await.unwrap();
    assert_eq!(f.scheduling.get_session(session.id).await.unwrap().status, SessionStatus::Completed);

    // the room no longer counts the session as active
    f.scheduling.delete_room(session.room_id).await.unwrap();
}

#[tokio::test]
async fn test_creation_requires_a_patient_and_known_session() {
    let f = fixture();

    let no_patient = f
        .procedures
        .create(
            CreateProcedureRequest {
                patient_id: None,
                therapist_id: None,
                session_id: None,
                therapy_type: Some("Nasya".to_string()),
                steps: None,
            },
            Uuid::new_v4(),
        )
        .await;
    assert_matches!(no_patient, Err(ProcedureError::ValidationError(_)));

    let unknown_session = f
        .procedures
        .create(
            CreateProcedureRequest {
                patient_id: Some(Uuid::new_v4()),
                therapist_id: None,
                session_id: Some(Uuid::new_v4()),
                therapy_type: None,
                steps: None,
            },
            Uuid::new_v4(),
        )
        .await;
    assert_matches!(unknown_session, Err(ProcedureError::SessionNotFound));
}

#[tokio::test]
async fn test_vitals_are_logged_and_published() {
    let f = fixture();
    let p = f.procedures.create(create_request(Uuid::new_v4(), custom_steps(1)), Uuid::new_v4()).await.unwrap();
    let mut rx = f.hub.subscribe(Topic::Procedure(p.id)).await;
    let nurse = Uuid::new_v4();

    let vitals = f
        .procedures
        .add_vitals(
            p.id,
            VitalsRequest {
                pulse: Some("76".to_string()),
                blood_pressure: Some("118/78".to_string()),
                temperature: Some("98.4F".to_string()),
                remarks: None,
            },
            nurse,
        )
        .await
        .unwrap();
    assert_eq!(vitals.recorded_by, nurse);
    assert_eq!(f.procedures.get(p.id).await.unwrap().vitals.len(), 1);

    let message = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    let event: Value = serde_json::from_str(&message).unwrap();
    assert_eq!(event["event"], "vitalsUpdated");
    assert_eq!(event["data"]["blood_pressure"], "118/78");
}

#[tokio::test]
async fn test_step_request_accepts_camel_case_json() {
    let request: StepUpdateRequest =
        serde_json::from_str(r#"{"stepIndex": 2, "status": "in-progress"}"#).unwrap();
    assert_eq!(request.step_index, 2);
    assert_eq!(request.status, Some(StepStatus::InProgress));
    assert!(!request.reset);

    let reset: StepUpdateRequest = serde_json::from_str(r#"{"stepIndex": 0, "reset": true}"#).unwrap();
    assert!(reset.reset);
    assert_eq!(reset.status, None);
}

#[tokio::test]
async fn test_vitals_accept_heart_rate_for_pulse() {
    let request: VitalsRequest =
        serde_json::from_str(r#"{"heartRate": "72", "bloodPressure": "118/76"}"#).unwrap();
    assert_eq!(request.pulse.as_deref(), Some("72"));
    assert_eq!(request.blood_pressure.as_deref(), Some("118/76"));

    let f = fixture();
    let p = f.procedures.create(create_request(Uuid::new_v4(), custom_steps(1)), Uuid::new_v4()).await.unwrap();
    let vitals = f.procedures.add_vitals(p.id, request, Uuid::new_v4()).await.unwrap();
    assert_eq!(vitals.pulse.as_deref(), Some("72"));
}
