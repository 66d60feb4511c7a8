use std::env;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 900;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub cors_origin: Option<String>,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub email_api_url: String,
    pub email_user: String,
    pub email_pass: String,
    pub email_from: String,
    pub uploads_dir: PathBuf,
    pub clinic_utc_offset_minutes: i32,
    pub reminder_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| {
                    warn!("PORT not set or invalid, using {}", DEFAULT_PORT);
                    DEFAULT_PORT
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty() && o != "*"),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, documents will be kept in memory");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_default(),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_API_URL not set, emails will only be logged");
                    String::new()
                }),
            email_user: env::var("EMAIL_USER").unwrap_or_default(),
            email_pass: env::var("EMAIL_PASS").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "AyurSutra <no-reply@ayursutra.local>".to_string()),
            uploads_dir: env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            reminder_interval_secs: env::var("REMINDER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REMINDER_INTERVAL_SECS),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing JWT_SECRET");
        }

        config
    }

    /// Minimal settings needed to authenticate requests.
    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty()
            && !self.email_user.is_empty()
            && !self.email_pass.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: String::new(),
            cors_origin: None,
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            email_api_url: String::new(),
            email_user: String::new(),
            email_pass: String::new(),
            email_from: "AyurSutra <no-reply@ayursutra.local>".to_string(),
            uploads_dir: PathBuf::from("uploads"),
            clinic_utc_offset_minutes: 0,
            reminder_interval_secs: DEFAULT_REMINDER_INTERVAL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_not_configured() {
        let config = AppConfig::default();
        assert_eq!(config.port, 4000);
        assert!(!config.is_configured());
        assert!(!config.is_database_configured());
        assert!(!config.is_email_configured());
    }

    #[test]
    fn email_requires_all_credentials() {
        let config = AppConfig {
            email_api_url: "http://mail.local/send".to_string(),
            email_user: "clinic".to_string(),
            ..AppConfig::default()
        };
        assert!(!config.is_email_configured());

        let config = AppConfig { email_pass: "secret".to_string(), ..config };
        assert!(config.is_email_configured());
    }
}
