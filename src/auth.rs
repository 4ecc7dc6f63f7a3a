//! Sign-in against the configured admin account.
//!
//! The issued token is opaque and nothing verifies it afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: AuthUser,
}

pub fn sign_in(config: &AppConfig, request: &SignInRequest) -> Result<AuthResponse, AppError> {
    let username = request.username.trim();
    if username != config.admin_user || request.password != config.admin_password {
        tracing::warn!(username, "rejected sign-in");
        return Err(AppError::Unauthorized);
    }

    tracing::info!(username, "admin signed in");
    Ok(AuthResponse {
        access_token: Uuid::new_v4().to_string(),
        token_type: "bearer",
        user: AuthUser {
            id: format!("admin-{username}"),
            name: "Administrator".to_string(),
            email: format!("{username}@edumind.local"),
            role: Role::Admin,
        },
    })
}
