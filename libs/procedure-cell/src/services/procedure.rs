// libs/procedure-cell/src/services/procedure.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use notification_cell::{Channel, CreateNotificationRequest, NotificationService, NotificationType};
use realtime_cell::{EventKind, RealtimeHub, Topic};
use scheduling_cell::{SchedulingError, SchedulingService, SessionStatus, UpdateSessionRequest};
use shared_database::{Collection, DocumentStore, Filter};

use crate::models::{
    CreateProcedureRequest, ProcedureError, ProcedureSearchQuery, ProcedureSession, ProcedureStatus,
    ProcedureView, Step, StepStatus, StepUpdateRequest, Vitals, VitalsRequest,
};
use crate::services::templates::default_steps;
use crate::services::tracker;

pub struct ProcedureService {
    procedures: Arc<dyn Collection<ProcedureSession>>,
    scheduling: Arc<SchedulingService>,
    notifications: Arc<NotificationService>,
    hub: Arc<RealtimeHub>,
    // read-modify-write of a procedure document happens under this lock
    writes: Mutex<()>,
}

impl ProcedureService {
    pub fn new(
        store: &DocumentStore,
        scheduling: Arc<SchedulingService>,
        notifications: Arc<NotificationService>,
        hub: Arc<RealtimeHub>,
    ) -> Self {
        Self {
            procedures: store.collection::<ProcedureSession>(),
            scheduling,
            notifications,
            hub,
            writes: Mutex::new(()),
        }
    }

    /// Creates a procedure, optionally for a booked session whose patient,
    /// practitioner and therapy fill in whatever the request leaves out.
    pub async fn create(
        &self,
        request: CreateProcedureRequest,
        created_by: Uuid,
    ) -> Result<ProcedureSession, ProcedureError> {
        let session = match request.session_id {
            Some(session_id) => Some(self.scheduling.get_session(session_id).await.map_err(|e| match e {
                SchedulingError::SessionNotFound => ProcedureError::SessionNotFound,
                other => ProcedureError::DatabaseError(other.to_string()),
            })?),
            None => None,
        };

        let patient_id = request
            .patient_id
            .or(session.as_ref().map(|s| s.patient_id))
            .ok_or_else(|| ProcedureError::ValidationError("patientId is required".to_string()))?;
        if let Some(session) = &session {
            if session.patient_id != patient_id {
                return Err(ProcedureError::ValidationError(
                    "patientId does not match the session's patient".to_string(),
                ));
            }
        }

        let therapist_id = request
            .therapist_id
            .or(session.as_ref().map(|s| s.practitioner_id))
            .unwrap_or(created_by);

        let therapy_type = request
            .therapy_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or(session.as_ref().map(|s| s.therapy_type.clone()))
            .ok_or_else(|| ProcedureError::ValidationError("therapyType is required".to_string()))?;

        let steps: Vec<Step> = match request.steps {
            Some(custom) => {
                if custom.iter().any(|s| s.name.trim().is_empty()) {
                    return Err(ProcedureError::ValidationError("Every step needs a name".to_string()));
                }
                custom
                    .iter()
                    .map(|s| Step::new(s.name.trim(), s.description.as_deref()))
                    .collect()
            }
            None => default_steps(&therapy_type),
        };

        let _guard = self.writes.lock().await;
        if let Some(session_id) = request.session_id {
            let existing = self
                .procedures
                .find(&Filter::new().eq("session_id", session_id))
                .await?;
            if !existing.is_empty() {
                return Err(ProcedureError::AlreadyExists(session_id));
            }
        }

        let now = Utc::now();
        let procedure = ProcedureSession {
            id: Uuid::new_v4(),
            patient_id,
            therapist_id,
            session_id: request.session_id,
            therapy_type,
            steps,
            vitals: Vec::new(),
            status: ProcedureStatus::Pending,
            start_time: None,
            end_time: None,
            created_by,
            created_at: now,
            updated_at: now,
        };

        let procedure = self.procedures.insert(procedure).await?;
        info!(
            "Procedure {} ({}) created with {} steps",
            procedure.id,
            procedure.therapy_type,
            procedure.steps.len()
        );
        Ok(procedure)
    }

    pub async fn list(&self, query: &ProcedureSearchQuery) -> Result<Vec<ProcedureSession>, ProcedureError> {
        let mut filter = Filter::new();
        if let Some(patient_id) = query.patient_id {
            filter = filter.eq("patient_id", patient_id);
        }
        if let Some(therapist_id) = query.therapist_id {
            filter = filter.eq("therapist_id", therapist_id);
        }
        if let Some(session_id) = query.session_id {
            filter = filter.eq("session_id", session_id);
        }
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }

        let mut procedures = self.procedures.find(&filter).await?;
        procedures.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(procedures)
    }

    pub async fn get(&self, procedure_id: Uuid) -> Result<ProcedureSession, ProcedureError> {
        self.procedures
            .get(procedure_id)
            .await?
            .ok_or(ProcedureError::NotFound)
    }

    /// Applies one step action: `reset`, or a move to the requested status.
    pub async fn update_step(
        &self,
        procedure_id: Uuid,
        request: StepUpdateRequest,
    ) -> Result<ProcedureSession, ProcedureError> {
        let (procedure, started) = {
            let _guard = self.writes.lock().await;
            let mut procedure = self.get(procedure_id).await?;
            let was_pending = procedure.status == ProcedureStatus::Pending;
            let now = Utc::now();
            let index = request.step_index;

            match (request.reset, request.status) {
                (true, _) => tracker::stop_or_reset_step(&mut procedure, index, true, now)?,
                (false, Some(StepStatus::InProgress)) => tracker::start_step(&mut procedure, index, now)?,
                (false, Some(StepStatus::Pending)) => {
                    tracker::stop_or_reset_step(&mut procedure, index, false, now)?
                }
                (false, Some(StepStatus::Completed)) => tracker::complete_step(&mut procedure, index, now)?,
                (false, None) => {
                    if request.notes.is_none() {
                        return Err(ProcedureError::ValidationError(
                            "Either status, reset or notes is required".to_string(),
                        ));
                    }
                    if procedure.is_completed() {
                        return Err(ProcedureError::ProcedureCompleted);
                    }
                }
            }

            if let Some(notes) = request.notes {
                let len = procedure.steps.len();
                let step = procedure
                    .steps
                    .get_mut(index)
                    .ok_or(ProcedureError::StepOutOfRange { index, len })?;
                step.notes = Some(notes);
            }

            procedure.updated_at = now;
            let procedure = self.procedures.update(procedure).await?;
            let started = was_pending && procedure.status == ProcedureStatus::InProgress;
            (procedure, started)
        };

        if started {
            self.sync_session(&procedure, SessionStatus::Ongoing)
                .await;
        }
        self.publish_procedure(&procedure).await;
        Ok(procedure)
    }

    pub async fn add_vitals(
        &self,
        procedure_id: Uuid,
        request: VitalsRequest,
        recorded_by: Uuid,
    ) -> Result<Vitals, ProcedureError> {
        let (procedure, vitals) = {
            let _guard = self.writes.lock().await;
            let mut procedure = self.get(procedure_id).await?;
            let now = Utc::now();

            let vitals = tracker::add_vitals(&mut procedure, request, recorded_by, now)?;
            procedure.updated_at = now;
            (self.procedures.update(procedure).await?, vitals)
        };

        self.hub
            .publish(Topic::Procedure(procedure.id), EventKind::VitalsUpdated, &vitals)
            .await;
        Ok(vitals)
    }

    /// Marks the procedure completed. Calling it again returns the procedure
    /// unchanged.
    pub async fn complete(&self, procedure_id: Uuid) -> Result<ProcedureSession, ProcedureError> {
        let procedure = {
            let _guard = self.writes.lock().await;
            let mut procedure = self.get(procedure_id).await?;
            let now = Utc::now();

            if !tracker::complete_procedure(&mut procedure, now) {
                return Ok(procedure);
            }
            procedure.updated_at = now;
            self.procedures.update(procedure).await?
        };

        info!("Procedure {} completed at {}% progress", procedure.id, procedure.progress());
        self.sync_session(&procedure, SessionStatus::Completed)
            .await;
        self.send_post_therapy(&procedure).await;
        self.publish_procedure(&procedure).await;
        Ok(procedure)
    }

    /// Moves the linked session forward to `to`, passing through `ongoing`
    /// when a scheduled session is completed directly. Best effort: a
    /// failure here never fails the procedure update.
    async fn sync_session(&self, procedure: &ProcedureSession, to: SessionStatus) {
        let Some(session_id) = procedure.session_id else {
            return;
        };

        let session = match self.scheduling.get_session(session_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Linked session {} unavailable: {}", session_id, e);
                return;
            }
        };

        let path = match session.status {
            from if from == to => Vec::new(),
            SessionStatus::Scheduled if to == SessionStatus::Completed => {
                vec![SessionStatus::Ongoing, SessionStatus::Completed]
            }
            from if from.can_transition_to(to) => vec![to],
            from => {
                warn!("Session {} is {}, not moving it to {}", session_id, from, to);
                Vec::new()
            }
        };

        for status in path {
            let update = UpdateSessionRequest { status: Some(status), ..Default::default() };
            if let Err(e) = self.scheduling.update_session(session_id, update).await {
                warn!("Could not move session {} to {}: {}", session_id, status, e);
                return;
            }
        }
    }

    async fn send_post_therapy(&self, procedure: &ProcedureSession) {
        let request = CreateNotificationRequest {
            user_id: procedure.patient_id,
            notification_type: NotificationType::PostTherapy,
            title: format!("{} completed", procedure.therapy_type),
            message: format!(
                "Your {} procedure is complete ({} of {} steps done).",
                procedure.therapy_type,
                procedure.completed_steps(),
                procedure.steps.len()
            ),
            channel: Channel::Email,
            reference_id: Some(procedure.id),
        };

        if let Err(e) = self.notifications.notify(request).await {
            warn!("Post-therapy notification for procedure {} failed: {}", procedure.id, e);
        }
    }

    async fn publish_procedure(&self, procedure: &ProcedureSession) {
        let view = ProcedureView::at(procedure, Utc::now());
        self.hub
            .publish(Topic::Procedure(procedure.id), EventKind::ProcedureUpdated, &view)
            .await;
    }
}
