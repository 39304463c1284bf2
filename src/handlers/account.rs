use axum::{Extension, Json, extract::State};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub email: String,
}

/// GET /account（ログイン必須）
pub async fn account(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<AccountResponse>, AppError> {
    let user = state
        .directory
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(Json(AccountResponse { email: user.email }))
}
