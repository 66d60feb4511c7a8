use std::sync::Arc;
use std::time::Duration;

use appointment_cell::{AppointmentReminders, AppointmentService, SessionReminders};
use auth_cell::AuthService;
use notification_cell::{transport_from_config, NotificationService, ReminderScheduler};
use patient_cell::PatientService;
use prescription_cell::PrescriptionService;
use procedure_cell::ProcedureService;
use realtime_cell::RealtimeHub;
use scheduling_cell::SchedulingService;
use shared_config::AppConfig;
use shared_database::DocumentStore;
use shared_utils::uploads::UploadStore;

/// Every service of the clinic API, wired against one document store and
/// one real-time hub.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub in_memory: bool,
    pub hub: Arc<RealtimeHub>,
    pub auth: Arc<AuthService>,
    pub notifications: Arc<NotificationService>,
    pub scheduling: Arc<SchedulingService>,
    pub procedures: Arc<ProcedureService>,
    pub appointments: Arc<AppointmentService>,
    pub patients: Arc<PatientService>,
    pub prescriptions: Arc<PrescriptionService>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let store = DocumentStore::from_config(&config);
        let hub = Arc::new(RealtimeHub::new());

        let auth = Arc::new(AuthService::new(&store, &config));
        let notifications = Arc::new(NotificationService::new(
            &store,
            auth.clone(),
            transport_from_config(&config),
            hub.clone(),
            &config,
        ));
        let scheduling = Arc::new(SchedulingService::new(&store, hub.clone(), &config));
        let procedures = Arc::new(ProcedureService::new(
            &store,
            scheduling.clone(),
            notifications.clone(),
            hub.clone(),
        ));
        let appointments = Arc::new(AppointmentService::new(
            &store,
            scheduling.clone(),
            notifications.clone(),
        ));
        let patients = Arc::new(PatientService::new(&store, UploadStore::new(&config.uploads_dir)));
        let prescriptions = Arc::new(PrescriptionService::new(
            &store,
            UploadStore::new(&config.uploads_dir),
        ));

        Self {
            in_memory: store.is_in_memory(),
            config,
            hub,
            auth,
            notifications,
            scheduling,
            procedures,
            appointments,
            patients,
            prescriptions,
        }
    }

    /// Periodic pre-therapy and appointment reminders.
    pub fn reminder_scheduler(&self) -> ReminderScheduler {
        ReminderScheduler::new(
            self.notifications.clone(),
            Duration::from_secs(self.config.reminder_interval_secs),
        )
        .with_source(Arc::new(AppointmentReminders::new(self.appointments.clone())))
        .with_source(Arc::new(SessionReminders::new(self.scheduling.clone())))
    }
}
