use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use tracing::debug;

use super::extractors::CurrentUser;
use crate::{
    error::AppError,
    state::AppState,
    users::repo_types::{Role, User},
};

/// Any authenticated user.
pub const ANY_ROLE: &[Role] = &[];

/// Decide whether `user` may reach a route requiring `required`.
/// An empty set admits every authenticated user.
pub fn authorize(user: Option<&User>, required: &[Role]) -> Result<(), AppError> {
    let Some(user) = user else {
        return Err(AppError::unauthorized("Not authorized"));
    };
    if !required.is_empty() && !required.contains(&user.role) {
        return Err(AppError::forbidden(format!(
            "Role {} is not allowed here",
            user.role.name()
        )));
    }
    Ok(())
}

/// Role requirement registered with one route.
#[derive(Clone)]
pub struct AccessGate {
    state: AppState,
    roles: &'static [Role],
}

/// Attach the role gate to a route.
pub fn gated(
    route: MethodRouter<AppState>,
    state: &AppState,
    roles: &'static [Role],
) -> MethodRouter<AppState> {
    let gate = AccessGate {
        state: state.clone(),
        roles,
    };
    route.route_layer(middleware::from_fn_with_state(gate, require_access))
}

async fn require_access(
    State(gate): State<AccessGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).map(str::to_owned);
    let user = match token {
        Some(token) => authenticate(&gate.state, &token).await,
        None => None,
    };
    authorize(user.as_ref(), gate.roles)?;
    if let Some(user) = user {
        req.extensions_mut().insert(CurrentUser(user));
    }
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller from the access token. Any failure yields `None`.
async fn authenticate(state: &AppState, token: &str) -> Option<User> {
    let claims = match state.jwt.verify_access(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "access token rejected");
            return None;
        }
    };
    match state.users.get_by_id(claims.sub).await {
        Ok(user) => Some(user),
        Err(e) => {
            debug!(error = %e, user_id = %claims.sub, "token subject not loadable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Profile;
    use axum::http::HeaderValue;

    fn user_with(role: Role) -> User {
        let mut user = User::pending("a@x.com", "hash".into(), Profile::default());
        user.role = role;
        user
    }

    #[test]
    fn anonymous_is_unauthorized() {
        let err = authorize(None, ANY_ROLE).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Not authorized"));
        let err = authorize(None, &[Role::Admin]).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn empty_role_set_admits_everyone() {
        for role in [Role::Admin, Role::Moderator, Role::User] {
            assert!(authorize(Some(&user_with(role)), ANY_ROLE).is_ok());
        }
    }

    #[test]
    fn role_outside_the_set_is_forbidden() {
        let staff = &[Role::Admin, Role::Moderator];
        assert!(authorize(Some(&user_with(Role::Admin)), staff).is_ok());
        assert!(authorize(Some(&user_with(Role::Moderator)), staff).is_ok());
        let err = authorize(Some(&user_with(Role::User)), staff).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
