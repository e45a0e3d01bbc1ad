use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account lifecycle state. Only `Active` accounts may authenticate.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Stored as its numeric code, rendered outward by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

impl Role {
    pub fn code(&self) -> i16 {
        match self {
            Self::Admin => 0,
            Self::Moderator => 1,
            Self::User => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Admin),
            1 => Some(Self::Moderator),
            2 => Some(Self::User),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Moderator => "Moderator",
            Self::User => "User",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub image: String,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

/// User record. `password_hash` is only populated by the login lookup;
/// saving a user with `None` keeps the stored hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub status: UserStatus,
    pub role: Role,
    pub profile: Profile,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// New pending account with the default role.
    pub fn pending(email: impl Into<String>, password_hash: String, profile: Profile) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: Some(password_hash),
            status: UserStatus::Pending,
            role: Role::default(),
            profile,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn without_password(mut self) -> Self {
        self.password_hash = None;
        self
    }
}

/// Row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub image: String,
    pub password_hash: Option<String>,
    pub status: String,
    pub role: i16,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let status = UserStatus::parse(&row.status)
            .ok_or_else(|| anyhow::anyhow!("unknown user status {:?}", row.status))?;
        let role = Role::from_code(row.role)
            .ok_or_else(|| anyhow::anyhow!("unknown role code {}", row.role))?;
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            status,
            role,
            profile: Profile {
                first_name: row.first_name,
                last_name: row.last_name,
                image: row.image,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_codes_roundtrip_and_names() {
        for role in [Role::Admin, Role::Moderator, Role::User] {
            assert_eq!(Role::from_code(role.code()), Some(role));
        }
        assert_eq!(Role::default().name(), "User");
        assert_eq!(Role::from_code(9), None);
    }

    #[test]
    fn pending_user_defaults() {
        let user = User::pending("a@x.com", "hash".into(), Profile::default());
        assert_eq!(user.status, UserStatus::Pending);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.password_hash.as_deref(), Some("hash"));
    }

    #[test]
    fn row_with_unknown_status_is_rejected() {
        let now = OffsetDateTime::now_utc();
        let row = UserRow {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            first_name: String::new(),
            last_name: "Doe".into(),
            image: String::new(),
            password_hash: None,
            status: "archived".into(),
            role: 2,
            created_at: now,
            updated_at: now,
        };
        assert!(User::try_from(row).is_err());
    }

    #[test]
    fn full_name_is_last_then_first() {
        let profile = Profile {
            first_name: "John".into(),
            last_name: "Doe".into(),
            image: String::new(),
        };
        assert_eq!(profile.full_name(), "Doe John");
    }
}
