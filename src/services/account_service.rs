use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::error::{ServiceError, ServiceResult};
use super::load_account;
use crate::auth::{hash_password, hash_token, new_session_token, verify_password};
use crate::config::SecurityConfig;
use crate::database::models::{AccountProfile, NewAccount};
use crate::database::{DataStore, DatabaseError};

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// A freshly issued session. `token` goes to the client, only its hash is stored.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub username: String,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub struct AccountService {
    store: Arc<dyn DataStore>,
    security: SecurityConfig,
}

impl AccountService {
    pub fn new(store: Arc<dyn DataStore>, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    pub async fn register(
        &self,
        request: &RegisterRequest,
        logged_in: bool,
    ) -> ServiceResult<AccountProfile> {
        let (Some(username), Some(password)) = (present(&request.username), request.password.as_deref().filter(|p| !p.is_empty())) else {
            return Err(ServiceError::validation("Must include username and password to register"));
        };
        if logged_in {
            return Err(ServiceError::forbidden("A user is currently logged in"));
        }
        let (Some(name), Some(email)) = (present(&request.name), present(&request.email)) else {
            return Err(ServiceError::validation("Must include name and email to register"));
        };

        let password_hash = hash_password(password, self.security.bcrypt_cost).await?;
        let account = self
            .store
            .insert_account(NewAccount {
                username: username.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(field) if field == "email" => {
                    ServiceError::Conflict("Email already exists".to_string())
                }
                DatabaseError::Conflict(_) => ServiceError::Conflict("Username already exists".to_string()),
                other => other.into(),
            })?;

        info!("New user created: {}", account.username);
        Ok(account.profile())
    }

    /// Verifies credentials and opens a session. Unknown users and wrong passwords look the same.
    pub async fn login(&self, request: &LoginRequest) -> ServiceResult<IssuedSession> {
        let (Some(username), Some(password)) = (present(&request.username), request.password.as_deref().filter(|p| !p.is_empty())) else {
            return Err(ServiceError::validation("Username and password are required"));
        };

        let verified = match self.store.find_account(username).await? {
            Some(account) => verify_password(password, &account.password_hash).await?,
            None => false,
        };
        if !verified {
            warn!("Failed login attempt for: {}", username);
            return Err(ServiceError::forbidden("Invalid username or password"));
        }

        let token = new_session_token();
        let expires_at = Utc::now() + Duration::hours(self.security.session_ttl_hours as i64);
        self.store
            .create_session(&hash_token(&token), username, expires_at)
            .await?;

        info!("User logged in: {}", username);
        Ok(IssuedSession {
            token,
            username: username.to_string(),
        })
    }

    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.store.delete_session(&hash_token(token)).await?;
        Ok(())
    }

    pub async fn me(&self, username: &str) -> ServiceResult<AccountProfile> {
        Ok(load_account(self.store.as_ref(), username).await?.profile())
    }
}
