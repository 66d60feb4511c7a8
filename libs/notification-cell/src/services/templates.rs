// libs/notification-cell/src/services/templates.rs
use rand::seq::SliceRandom;

use crate::models::{EmailMessage, Notification, NotificationType};

pub const DAILY_TIPS: &[&str] = &[
    "Start the day with a glass of warm water to kindle agni.",
    "Eat your largest meal at midday, when digestion is strongest.",
    "A short self-massage with warm sesame oil calms vata before bathing.",
    "Favour freshly cooked, seasonal food over leftovers.",
    "Go to bed before 10 pm to follow the natural kapha rhythm of the evening.",
    "Sip warm ginger tea between meals rather than cold drinks with them.",
    "Take ten minutes of slow nasal breathing after waking.",
    "Avoid heavy exercise immediately after a Panchakarma session; rest instead.",
];

pub fn pick_daily_tip() -> &'static str {
    DAILY_TIPS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Stay hydrated and rest well between therapies.")
}

fn subject_prefix(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::PreTherapy => "Preparing for your therapy",
        NotificationType::PostTherapy => "After your therapy",
        NotificationType::DailyTip => "Your daily wellness tip",
        NotificationType::AppointmentReminder => "Appointment reminder",
        NotificationType::General => "AyurSutra update",
    }
}

/// Guidance appended to therapy notifications.
fn care_footer(kind: NotificationType) -> Option<&'static str> {
    match kind {
        NotificationType::PreTherapy => Some(
            "Please arrive 15 minutes early, eat only a light meal beforehand and wear loose clothing.",
        ),
        NotificationType::PostTherapy => Some(
            "Rest for the remainder of the day, drink warm water and avoid cold food and exposure to wind.",
        ),
        _ => None,
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_email(notification: &Notification, from: &str, to: &str) -> EmailMessage {
    let subject = format!("{}: {}", subject_prefix(notification.notification_type), notification.title);

    let mut text = notification.message.clone();
    if let Some(footer) = care_footer(notification.notification_type) {
        text.push_str("\n\n");
        text.push_str(footer);
    }

    let mut html = format!(
        "<h2>{}</h2><p>{}</p>",
        escape_html(&notification.title),
        escape_html(&notification.message)
    );
    if let Some(footer) = care_footer(notification.notification_type) {
        html.push_str(&format!("<p><em>{}</em></p>", escape_html(footer)));
    }
    html.push_str("<p>AyurSutra Panchakarma Clinic</p>");

    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject,
        text,
        html,
    }
}
