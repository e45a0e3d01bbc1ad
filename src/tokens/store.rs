use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cache::Cache;
use crate::config::TokenTtlConfig;
use crate::error::AppError;

const PENDING_VALUE: &str = "true";

/// Key family of a one-time token.
///
/// Each family owns two keys in the cache:
/// - `<family>:token:<token>` maps the token to a user id for `ttl`.
/// - `<family>:requested_by:<user id>` is the pending marker, kept for
///   `2 * ttl`, that rejects another issuance while one is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    EmailConfirmation,
    PasswordReset,
}

impl TokenKind {
    fn family(&self) -> &'static str {
        match self {
            Self::EmailConfirmation => "email_confirm",
            Self::PasswordReset => "password_reset",
        }
    }

    pub(crate) fn token_key(&self, token: &str) -> String {
        format!("{}:token:{}", self.family(), token)
    }

    pub(crate) fn marker_key(&self, user_id: Uuid) -> String {
        format!("{}:requested_by:{}", self.family(), user_id)
    }

    fn already_pending(&self) -> &'static str {
        match self {
            Self::EmailConfirmation => "Confirmation email already has been sent. Try later.",
            Self::PasswordReset => "Password change has been requested already",
        }
    }
}

#[derive(Clone)]
pub struct TokenStore {
    cache: Arc<dyn Cache>,
    ttls: TokenTtlConfig,
}

impl TokenStore {
    pub fn new(cache: Arc<dyn Cache>, ttls: TokenTtlConfig) -> Self {
        Self { cache, ttls }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        let secs = match kind {
            TokenKind::EmailConfirmation => self.ttls.email_confirmation_ttl_secs,
            TokenKind::PasswordReset => self.ttls.password_reset_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// True while a pending marker exists for the user.
    pub async fn is_pending(&self, kind: TokenKind, user_id: Uuid) -> Result<bool, AppError> {
        let marker = self.cache.get(&kind.marker_key(user_id)).await?;
        Ok(marker.as_deref() == Some(PENDING_VALUE))
    }

    /// Claim the pending marker, then mint and store a token for the user.
    /// Fails with `Conflict` while an earlier token is still pending; of two
    /// concurrent issues only the one that claims the marker succeeds.
    #[instrument(skip(self))]
    pub async fn issue(&self, kind: TokenKind, user_id: Uuid) -> Result<String, AppError> {
        let ttl = self.ttl(kind);
        let marker_key = kind.marker_key(user_id);
        if !self
            .cache
            .set_if_absent(&marker_key, PENDING_VALUE, ttl.saturating_mul(2))
            .await?
        {
            return Err(AppError::conflict(kind.already_pending()));
        }

        let token = Uuid::new_v4().to_string();
        if let Err(e) = self
            .cache
            .set(&kind.token_key(&token), &user_id.to_string(), ttl)
            .await
        {
            // release the claim so the user is not locked out until it expires
            if let Err(release) = self.cache.delete(&marker_key).await {
                warn!(error = %release, %user_id, "pending marker not released");
            }
            return Err(e.into());
        }
        debug!(%user_id, ttl_secs = ttl.as_secs(), "token issued");
        Ok(token)
    }

    /// Resolve a token to its user id and delete both the token and the
    /// marker. Deletion happens whether or not the caller later accepts
    /// the user.
    #[instrument(skip(self, token))]
    pub async fn consume(&self, kind: TokenKind, token: &str) -> Result<Option<Uuid>, AppError> {
        let token_key = kind.token_key(token);
        let value = self.cache.get(&token_key).await?;
        self.cache.delete(&token_key).await?;

        let user_id = value.and_then(|v| Uuid::parse_str(&v).ok());
        if let Some(user_id) = user_id {
            self.cache.delete(&kind.marker_key(user_id)).await?;
        }
        Ok(user_id)
    }
}
