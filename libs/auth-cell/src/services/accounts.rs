use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{Collection, DocumentStore, Filter};
use shared_models::auth::{Role, TokenResponse, User};
use shared_utils::jwt::{issue_token, validate_token};
use shared_utils::validation::{non_empty, normalize_email, validate_email, validate_phone};

use crate::models::{AuthError, LoginRequest, PublicUser, RegisterRequest, UserAccount};
use crate::services::password::{check_password_policy, hash_password, verify_password};

pub struct AuthService {
    users: Arc<dyn Collection<UserAccount>>,
    jwt_secret: String,
    // serialises the unique-email check with the insert
    registration: Mutex<()>,
}

impl AuthService {
    pub fn new(store: &DocumentStore, config: &AppConfig) -> Self {
        Self {
            users: store.collection::<UserAccount>(),
            jwt_secret: config.jwt_secret.clone(),
            registration: Mutex::new(()),
        }
    }

    /// Creates an account and signs the new user in. Admin accounts may only
    /// be created by an admin, except for the very first account.
    pub async fn register(
        &self,
        request: RegisterRequest,
        caller: Option<&User>,
    ) -> Result<TokenResponse, AuthError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AuthError::ValidationError("Name is required".to_string()));
        }

        let email = normalize_email(&request.email);
        if !validate_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        check_password_policy(&request.password)?;

        let phone = non_empty(request.phone);
        if let Some(phone) = &phone {
            if !validate_phone(phone) {
                return Err(AuthError::ValidationError("Invalid phone number".to_string()));
            }
        }

        let role = request.role.unwrap_or(Role::Patient);
        let password_hash = hash_password(&request.password)?;

        let account = {
            let _guard = self.registration.lock().await;

            if role == Role::Admin && !caller.is_some_and(User::is_admin) {
                let has_users = !self.users.all().await?.is_empty();
                if has_users {
                    warn!("Refused admin self-registration for {}", email);
                    return Err(AuthError::AdminRegistrationClosed);
                }
                info!("Bootstrapping first admin account {}", email);
            }

            if self.find_by_email(&email).await?.is_some() {
                return Err(AuthError::EmailTaken);
            }

            let now = Utc::now();
            self.users
                .insert(UserAccount {
                    id: Uuid::new_v4(),
                    name,
                    email,
                    phone,
                    role,
                    password_hash,
                    created_at: now,
                    updated_at: now,
                })
                .await?
        };

        info!("Registered {} account {}", account.role, account.id);
        self.token_for(&account)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AuthError> {
        let email = normalize_email(&request.email);
        let account = self
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &account.password_hash)? {
            debug!("Wrong password for {}", account.id);
            return Err(AuthError::InvalidCredentials);
        }

        info!("User {} logged in", account.id);
        self.token_for(&account)
    }

    pub async fn me(&self, user: &User) -> Result<PublicUser, AuthError> {
        self.users
            .get(user.id)
            .await?
            .map(|account| account.to_public())
            .ok_or(AuthError::UserNotFound)
    }

    /// Validates a bearer token without requiring the route to be protected.
    pub fn authenticate(&self, token: &str) -> Option<User> {
        validate_token(token, &self.jwt_secret).ok()
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<PublicUser>, AuthError> {
        Ok(self.users.get(user_id).await?.map(|account| account.to_public()))
    }

    pub async fn users_with_role(&self, role: Role) -> Result<Vec<PublicUser>, AuthError> {
        Ok(self
            .users
            .find(&Filter::new().eq("role", role))
            .await?
            .iter()
            .map(UserAccount::to_public)
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AuthError> {
        Ok(self
            .users
            .find(&Filter::new().eq("email", email))
            .await?
            .into_iter()
            .next())
    }

    fn token_for(&self, account: &UserAccount) -> Result<TokenResponse, AuthError> {
        let token = issue_token(account.id, account.role, &account.name, &self.jwt_secret)
            .map_err(AuthError::Token)?;

        Ok(TokenResponse {
            token,
            role: account.role,
            name: account.name.clone(),
            user_id: account.id,
        })
    }
}
