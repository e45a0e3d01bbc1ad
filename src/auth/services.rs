use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    auth::{
        jwt::{JwtKeys, TokenPair},
        password::{hash_password_async, verify_password_async},
    },
    error::AppError,
    notifications::{NotificationDispatcher, NotificationEvent, UserNotification},
    tokens::{TokenKind, TokenStore},
    users::{
        dto::{Page, Pagination, UserResponse},
        repo::UserRepository,
        repo_types::{Profile, User, UserStatus},
    },
};

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub last_name: String,
    pub first_name: Option<String>,
}

/// Validated password reset completion input.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub email: String,
    pub password: String,
    pub password_repeat: String,
    pub token: String,
}

/// Registration, confirmation, login, refresh and password reset.
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    tokens: TokenStore,
    notifier: Arc<dyn NotificationDispatcher>,
    jwt: JwtKeys,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenStore,
        notifier: Arc<dyn NotificationDispatcher>,
        jwt: JwtKeys,
    ) -> Self {
        Self {
            users,
            tokens,
            notifier,
            jwt,
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: Registration) -> Result<UserResponse, AppError> {
        if let Some(existing) = self.users.find_by_email(&input.email).await? {
            if existing.status != UserStatus::Pending {
                warn!(user_id = %existing.id, "email already taken");
                return Err(AppError::conflict("Email has been already taken."));
            }
            if self
                .tokens
                .is_pending(TokenKind::EmailConfirmation, existing.id)
                .await?
            {
                warn!(user_id = %existing.id, "confirmation still pending");
                return Err(AppError::conflict(
                    "Confirmation email already has been sent. Try later.",
                ));
            }
            // unconfirmed and its marker expired: start over
            self.users.remove(&existing).await?;
            info!(user_id = %existing.id, "stale pending user removed");
        }

        let hash = hash_password_async(input.password).await?;
        let profile = Profile {
            first_name: input.first_name.unwrap_or_default(),
            last_name: input.last_name,
            image: String::new(),
        };
        let user = self
            .users
            .save(&User::pending(input.email, hash, profile))
            .await?;

        let token = self
            .tokens
            .issue(TokenKind::EmailConfirmation, user.id)
            .await?;
        self.notifier.dispatch(
            NotificationEvent::UserCreated,
            UserNotification::new(&user, token),
        );

        info!(user_id = %user.id, "user registered");
        Ok(UserResponse::from(&user))
    }

    #[instrument(skip(self, token))]
    pub async fn confirm_email(&self, token: &str) -> Result<TokenPair, AppError> {
        let invalid = || AppError::unauthorized("Token is not valid");

        let user_id = self
            .tokens
            .consume(TokenKind::EmailConfirmation, token)
            .await?
            .ok_or_else(invalid)?;
        let mut user = match self.users.get_by_id(user_id).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(invalid()),
            Err(e) => return Err(e),
        };

        if user.status != UserStatus::Pending {
            warn!(%user_id, status = user.status.as_str(), "confirmation for non-pending user");
            return Err(AppError::forbidden("User has been already activated"));
        }

        user.status = UserStatus::Active;
        let user = self.users.save(&user).await?;
        info!(%user_id, "email confirmed");
        Ok(self.jwt.issue_pair(&user)?)
    }

    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = self.users.find_by_email_for_login(email).await?;
        let hash = user.as_ref().and_then(|u| u.password_hash.clone());
        let valid = verify_password_async(password.to_string(), hash).await?;

        let Some(user) = user else {
            warn!("login for unknown email");
            return Err(AppError::unprocessable("User doesnt exist"));
        };
        if !valid {
            warn!(user_id = %user.id, "login with invalid password");
            return Err(AppError::unprocessable("Invalid password"));
        }

        match user.status {
            UserStatus::Pending => {
                return Err(AppError::unprocessable("User was not activated yet"))
            }
            UserStatus::Disabled => {
                return Err(AppError::unprocessable("User is disabled at the moment"))
            }
            UserStatus::Active => {}
        }

        info!(user_id = %user.id, "user logged in");
        Ok(self.jwt.issue_pair(&user)?)
    }

    /// The previous refresh token is not revoked.
    #[instrument(skip(self, token))]
    pub async fn refresh_tokens(&self, token: &str) -> Result<TokenPair, AppError> {
        if token.is_empty() {
            return Err(AppError::unprocessable("Token must be provided"));
        }
        let claims = self.jwt.verify_refresh(token).map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            AppError::bad_request(e.to_string())
        })?;
        let user = match self.users.get_by_id(claims.sub).await {
            Ok(user) => user,
            Err(AppError::NotFound(message)) => return Err(AppError::BadRequest(message)),
            Err(e) => return Err(e),
        };
        Ok(self.jwt.issue_pair(&user)?)
    }

    #[instrument(skip(self, email))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) if user.status == UserStatus::Active => user,
            _ => {
                return Err(AppError::not_found(
                    "Email does not exist or user is not activated",
                ))
            }
        };

        let token = self.tokens.issue(TokenKind::PasswordReset, user.id).await?;
        self.notifier.dispatch(
            NotificationEvent::UserRequestedPasswordReset,
            UserNotification::new(&user, token),
        );
        info!(user_id = %user.id, "password reset requested");
        Ok(())
    }

    /// Reset tokens are single-use: the mapping and its marker are removed
    /// as soon as the token is resolved.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn complete_password_reset(
        &self,
        input: PasswordChange,
    ) -> Result<UserResponse, AppError> {
        if input.password != input.password_repeat {
            return Err(AppError::validation("Passwords should match each other"));
        }

        let invalid = || AppError::unauthorized("Token is not valid");
        let user_id = self
            .tokens
            .consume(TokenKind::PasswordReset, &input.token)
            .await?
            .ok_or_else(invalid)?;
        let mut user = match self.users.get_by_id(user_id).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(invalid()),
            Err(e) => return Err(e),
        };
        if user.email != input.email {
            warn!(%user_id, "reset token used with another email");
            return Err(invalid());
        }

        user.password_hash = Some(hash_password_async(input.password).await?);
        let user = self.users.save(&user).await?;
        info!(%user_id, "password changed");
        Ok(UserResponse::from(&user))
    }

    pub fn profile(&self, user: &User) -> UserResponse {
        UserResponse::from(user)
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, page: u32, limit: u32) -> Result<Page<UserResponse>, AppError> {
        let (page, limit) = Pagination::normalized(page, limit);
        let (users, total) = self.users.list(page, limit).await?;
        let items = users.iter().map(UserResponse::from).collect();
        Ok(Page::new(items, total, page, limit))
    }
}
