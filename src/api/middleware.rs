use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use super::{ApiError, SharedState};
use crate::auth::bearer_token;
use crate::models::Member;

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub member: Member,
    pub token: String,
}

/// Resolves the bearer token to a user or rejects with 401.
pub async fn require_auth(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("Authorization token required".into()))?;

    let lookup = token.clone();
    let user = state
        .db
        .call(move |db| db.validate_session(&lookup))
        .await?;

    tracing::Span::current().record("user_id", tracing::field::display(user.id));
    req.extensions_mut().insert(CurrentUser {
        member: user.to_member(),
        token,
    });
    Ok(next.run(req).await)
}
