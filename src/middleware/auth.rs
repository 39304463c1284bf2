use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::session::read_cookie;
use crate::state::AppState;

/// ログイン中のユーザー（リクエスト拡張に格納）
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

/// ログイン必須ミドルウェア
///
/// セッションCookieが有効でなければ `/login` へのリダイレクトを返す
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_value = read_cookie(request.headers(), &state.config.session_cookie_name)
        .ok_or(AppError::Unauthenticated)?;

    let user_id = state
        .session_gate
        .resolve(&cookie_value, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| {
            tracing::debug!("無効または期限切れのセッション");
            AppError::Unauthenticated
        })?;

    request.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(request).await)
}
