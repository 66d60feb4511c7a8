pub mod patient;

pub use patient::{PatientService, UPLOAD_CATEGORY};
