use axum::{Json, extract::State, response::IntoResponse};
use garde::Validate;
use http::header::SET_COOKIE;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::AppError;
use crate::handlers::flash::FlashResponse;
use crate::handlers::validate_request;
use crate::services::session::{prune_expired_sessions, session_cookie};
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// ユーザーのメールアドレス
    #[garde(email)]
    pub email: String,
    /// ユーザーのパスワード
    #[garde(length(min = 1))]
    pub password: String,
}

/// ログインハンドラー
///
/// POST /login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. ユーザー認証（DB照合）
/// 3. セッション確立、Cookie を発行
/// 4. 期限切れセッションの掃除
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. リクエストバリデーション
    validate_request(&request, "メールアドレスとパスワードを入力してください")?;

    // 2. ユーザー認証
    let user = state
        .auth_service()
        .authenticate(&request.email, &request.password)
        .await?;

    // 3. セッション確立
    let session = state.session_gate.establish(&user).await?;
    let cookie = session_cookie(
        &state.config.session_cookie_name,
        &session.cookie_value,
        state.config.session_ttl_secs,
    )?;

    // 4. 期限切れセッションの掃除
    prune_expired_sessions(state.session_gate.as_ref(), OffsetDateTime::now_utc()).await;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(FlashResponse::success("ログインしました", "/")),
    ))
}
