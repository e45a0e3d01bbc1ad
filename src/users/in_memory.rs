use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::users::repo::{user_not_found, UserRepository};
use crate::users::repo_types::User;

/// Map-backed user store mirroring the Postgres contract.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .map(User::without_password))
    }

    async fn find_by_email_for_login(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let users = self.users.read().await;
        users
            .get(&id)
            .cloned()
            .map(User::without_password)
            .ok_or_else(user_not_found)
    }

    async fn save(&self, user: &User) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(AppError::conflict("Email has been already taken."));
        }

        let mut stored = user.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        if stored.password_hash.is_none() {
            stored.password_hash = users.get(&user.id).and_then(|u| u.password_hash.clone());
        }
        users.insert(stored.id, stored.clone());
        Ok(stored.without_password())
    }

    async fn remove(&self, user: &User) -> Result<User, AppError> {
        self.users.write().await.remove(&user.id);
        Ok(user.clone().without_password())
    }

    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<User>, u64), AppError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let total = all.len() as u64;
        let skip = page.saturating_sub(1) as usize * limit as usize;
        let items = all
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .map(User::without_password)
            .collect();
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Profile;

    fn user(email: &str) -> User {
        User::pending(email, "hash".into(), Profile::default())
    }

    #[tokio::test]
    async fn lookups_hide_the_hash_except_for_login() {
        let repo = InMemoryUserRepository::new();
        let u = user("a@x.com");
        repo.save(&u).await.unwrap();

        let found = repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(found.password_hash.is_none());
        let by_id = repo.get_by_id(u.id).await.unwrap();
        assert!(by_id.password_hash.is_none());
        let login = repo.find_by_email_for_login("a@x.com").await.unwrap().unwrap();
        assert_eq!(login.password_hash.as_deref(), Some("hash"));
    }

    #[tokio::test]
    async fn save_without_hash_keeps_stored_hash() {
        let repo = InMemoryUserRepository::new();
        let u = user("a@x.com");
        repo.save(&u).await.unwrap();

        let mut loaded = repo.get_by_id(u.id).await.unwrap();
        loaded.profile.first_name = "Jane".into();
        repo.save(&loaded).await.unwrap();

        let login = repo.find_by_email_for_login("a@x.com").await.unwrap().unwrap();
        assert_eq!(login.password_hash.as_deref(), Some("hash"));
        assert_eq!(login.profile.first_name, "Jane");
    }

    #[tokio::test]
    async fn email_is_unique() {
        let repo = InMemoryUserRepository::new();
        repo.save(&user("a@x.com")).await.unwrap();
        let err = repo.save(&user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn get_by_id_missing_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_pages_through_users() {
        let repo = InMemoryUserRepository::new();
        for i in 0..5 {
            repo.save(&user(&format!("u{i}@x.com"))).await.unwrap();
        }
        let (first, total) = repo.list(1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(first.len(), 2);
        let (last, _) = repo.list(3, 2).await.unwrap();
        assert_eq!(last.len(), 1);
        let (beyond, _) = repo.list(4, 2).await.unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_the_record() {
        let repo = InMemoryUserRepository::new();
        let u = user("a@x.com");
        repo.save(&u).await.unwrap();
        repo.remove(&u).await.unwrap();
        assert_eq!(repo.len().await, 0);
        assert!(repo.find_by_email("a@x.com").await.unwrap().is_none());
    }
}
