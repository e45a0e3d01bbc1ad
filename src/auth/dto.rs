use serde::Deserialize;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub last_name: String,
    #[serde(default)]
    pub first_name: Option<String>,
}

/// Query of the email confirmation link.
#[derive(Debug, Deserialize)]
pub struct EmailConfirmQuery {
    #[serde(default)]
    pub token: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Query for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// Request body completing a password reset.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub email: String,
    pub password: String,
    pub password_repeat: String,
    #[serde(alias = "hash")]
    pub token: String,
}
