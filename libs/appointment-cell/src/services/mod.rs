pub mod booking;
pub mod lifecycle;
pub mod reminders;

pub use booking::AppointmentService;
pub use reminders::{AppointmentReminders, SessionReminders};
