//! Fire-and-forget events for the mail service.

mod dispatcher;
mod sink;

pub use dispatcher::{NotificationDispatcher, QueueDispatcher};
pub use sink::{HttpSink, LogSink, NotificationSink};

use serde::Serialize;
use uuid::Uuid;

use crate::users::repo_types::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    UserCreated,
    UserRequestedPasswordReset,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCreated => "user_created",
            Self::UserRequestedPasswordReset => "user_requested_password_reset",
        }
    }
}

/// Payload carried by both events.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserNotification {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub token: String,
}

impl UserNotification {
    pub fn new(user: &User, token: impl Into<String>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.profile.full_name(),
            token: token.into(),
        }
    }
}

/// One queued event.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub event: NotificationEvent,
    pub payload: UserNotification,
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Profile;

    #[test]
    fn event_names_match_the_mail_service() {
        assert_eq!(NotificationEvent::UserCreated.as_str(), "user_created");
        assert_eq!(
            NotificationEvent::UserRequestedPasswordReset.as_str(),
            "user_requested_password_reset"
        );
    }

    #[test]
    fn payload_shape() {
        let user = User::pending(
            "a@x.com",
            "hash".into(),
            Profile {
                first_name: "John".into(),
                last_name: "Doe".into(),
                image: String::new(),
            },
        );
        let payload = UserNotification::new(&user, "tok");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["full_name"], "Doe John");
        assert_eq!(json["token"], "tok");
        assert_eq!(json["id"], user.id.to_string());
    }
}
