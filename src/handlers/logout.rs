use axum::{Json, extract::State, response::IntoResponse};
use http::{HeaderMap, header::SET_COOKIE};

use crate::error::AppError;
use crate::handlers::flash::FlashResponse;
use crate::services::session::{expired_session_cookie, read_cookie};
use crate::state::AppState;

/// ログアウトハンドラー
///
/// POST /logout
///
/// セッションを破棄し、Cookie を失効させる。
/// 未ログインでも成功として扱う。
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let cookie_name = &state.config.session_cookie_name;

    if let Some(cookie_value) = read_cookie(&headers, cookie_name) {
        state.session_gate.revoke(&cookie_value).await?;
        tracing::info!("ログアウト完了");
    }

    Ok((
        [(SET_COOKIE, expired_session_cookie(cookie_name)?)],
        Json(FlashResponse::success("ログアウトしました", "/")),
    ))
}
