pub mod dispatch;
pub mod reminders;
pub mod templates;
pub mod transport;

pub use dispatch::NotificationService;
pub use reminders::{DueReminder, ReminderScheduler, ReminderSource};
pub use transport::{transport_from_config, EmailTransport, HttpEmailTransport, LogTransport};
