use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

use crate::jwt::issue_token_with_ttl;

pub struct TestConfig {
    pub jwt_secret: String,
    pub uploads_dir: std::path::PathBuf,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            uploads_dir: std::env::temp_dir().join(format!("ayursutra-test-{}", Uuid::new_v4())),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            uploads_dir: self.uploads_dir.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("Test Patient", Role::Patient)
    }
}

impl TestUser {
    pub fn new(name: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role,
        }
    }

    pub fn admin() -> Self {
        Self::new("Clinic Admin", Role::Admin)
    }

    pub fn doctor() -> Self {
        Self::new("Dr. Vaidya", Role::Doctor)
    }

    pub fn therapist() -> Self {
        Self::new("Therapist Anand", Role::Therapist)
    }

    pub fn patient() -> Self {
        Self::new("Patient Lakshmi", Role::Patient)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            role: self.role,
            name: Some(self.name.clone()),
            issued_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        issue_token_with_ttl(
            user.id,
            user.role,
            &user.name,
            secret,
            Duration::hours(exp_hours.unwrap_or(8)),
        )
        .expect("test secret must not be empty")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(8))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}
