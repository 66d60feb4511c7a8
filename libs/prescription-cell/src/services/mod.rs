pub mod prescription;

pub use prescription::{PrescriptionService, UPLOAD_CATEGORY};
