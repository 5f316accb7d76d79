//! Credential service contract: exchange username/password for a bearer token.
//!
//! A successful login is written straight into the injected
//! [`TokenProvider`]; nothing else in the client reads ambient credentials.

use std::sync::Arc;

use serde::Deserialize;

use ragchat_core::config::ServiceConfig;
use ragchat_core::{CoreError, Credentials, TokenProvider};

use crate::error::ServiceError;
use crate::http::Transport;
use crate::wire::{LoginBody, SignupBody};

/// Minimum password length accepted by signup.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Errors from login and signup.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("could not persist credentials: {0}")]
    Store(#[from] CoreError),
}

/// Body of a successful `POST /login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Account registration form.
#[derive(Debug, Clone, Default)]
pub struct SignupRequest {
    pub full_name: String,
    pub username: String,
    pub password: String,
}

impl SignupRequest {
    pub fn new(
        full_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reject incomplete forms before any request is made.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.full_name.is_empty() || self.username.is_empty() || self.password.is_empty() {
            return Err(AuthError::Invalid("Please fill in all fields".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Invalid(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// Client for the `/login` and `/signup` endpoints.
pub struct AuthClient {
    transport: Transport,
    tokens: Arc<dyn TokenProvider>,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            transport: Transport::new(base_url),
            tokens,
        }
    }

    pub fn from_config(config: &ServiceConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::new(config.base_url.clone(), tokens)
    }

    /// Log in and store the returned token and display name.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let request = self
            .transport
            .post("/login", None)
            .json(&LoginBody { username, password });
        let response: LoginResponse = self.transport.execute("login", request).await?;

        self.tokens.store(Credentials::new(
            response.access_token.clone(),
            response.full_name.clone(),
        ))?;
        tracing::info!(username, "Logged in");
        Ok(response)
    }

    /// Register a new account. Does not log in.
    pub async fn signup(&self, form: &SignupRequest) -> Result<(), AuthError> {
        form.validate()?;
        let request = self.transport.post("/signup", None).json(&SignupBody {
            full_name: &form.full_name,
            username: &form.username,
            password: &form.password,
        });
        let _: serde_json::Value = self.transport.execute("signup", request).await?;
        tracing::info!(username = %form.username, "Account created");
        Ok(())
    }
}
