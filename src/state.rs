use std::sync::Arc;

use tracing::warn;

use crate::{
    auth::{jwt::JwtKeys, services::AccountService},
    cache::{in_memory::InMemoryCache, redis::RedisCache, Cache},
    config::AppConfig,
    db,
    notifications::{HttpSink, LogSink, NotificationDispatcher, NotificationSink, QueueDispatcher},
    tokens::TokenStore,
    users::repo::{PgUserRepository, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub accounts: Arc<AccountService>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await;

        let cache: Arc<dyn Cache> = match &config.redis_url {
            Some(url) => Arc::new(RedisCache::connect(url).await?),
            None => {
                warn!("REDIS_URL not set; one-time tokens live in process memory");
                Arc::new(InMemoryCache::new())
            }
        };

        let sink: Arc<dyn NotificationSink> = match &config.notifications.mail_service_url {
            Some(url) => Arc::new(HttpSink::new(url.as_str())?),
            None => {
                warn!("MAIL_SERVICE_URL not set; notifications are only logged");
                Arc::new(LogSink)
            }
        };
        // the worker stops once the last dispatcher handle is dropped
        let (notifier, _worker) =
            QueueDispatcher::spawn(sink, config.notifications.queue_capacity);

        let users = Arc::new(PgUserRepository::new(pool)) as Arc<dyn UserRepository>;
        Ok(Self::from_parts(config, users, cache, Arc::new(notifier)))
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        cache: Arc<dyn Cache>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let jwt = JwtKeys::new(&config.jwt);
        let tokens = TokenStore::new(cache, config.tokens.clone());
        let accounts = Arc::new(AccountService::new(
            users.clone(),
            tokens,
            notifier,
            jwt.clone(),
        ));
        Self {
            users,
            accounts,
            jwt,
        }
    }
}

/// Handles on the in-memory doubles behind [`AppState::fake`].
#[cfg(test)]
pub struct Fakes {
    pub users: Arc<crate::users::in_memory::InMemoryUserRepository>,
    pub cache: Arc<InMemoryCache>,
    pub notifier: Arc<crate::notifications::testing::RecordingDispatcher>,
}

#[cfg(test)]
impl AppState {
    pub fn fake() -> (Self, Fakes) {
        let fakes = Fakes {
            users: Arc::new(crate::users::in_memory::InMemoryUserRepository::new()),
            cache: Arc::new(InMemoryCache::new()),
            notifier: Arc::new(Default::default()),
        };
        let state = Self::from_parts(
            AppConfig::for_tests(),
            fakes.users.clone(),
            fakes.cache.clone(),
            fakes.notifier.clone(),
        );
        (state, fakes)
    }
}
