use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{User, UserStatus};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Outward view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub image: String,
    pub status: UserStatus,
    pub role: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.profile.first_name.clone(),
            last_name: user.profile.last_name.clone(),
            image: user.profile.image.clone(),
            status: user.status,
            role: user.role.name(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}
fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Pagination {
    /// Page at least 1, limit within 1..=100.
    pub fn normalized(page: u32, limit: u32) -> (u32, u32) {
        (page.max(1), limit.clamp(1, MAX_PAGE_LIMIT))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_items: u64,
    pub item_count: usize,
    pub items_per_page: u32,
    pub total_pages: u64,
    pub current_page: u32,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: u64, page: u32, limit: u32) -> Self {
        let total_pages = total_items.div_ceil(u64::from(limit.max(1)));
        Self {
            meta: PageMeta {
                total_items,
                item_count: items.len(),
                items_per_page: limit,
                total_pages,
                current_page: page,
            },
            items,
        }
    }
}
