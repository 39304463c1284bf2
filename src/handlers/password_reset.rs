use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use garde::Validate;
use http::{
    HeaderMap,
    header::{HOST, SET_COOKIE},
};
use serde::{Deserialize, Serialize};

use crate::config::ResetRequestPolicy;
use crate::error::AppError;
use crate::handlers::flash::FlashResponse;
use crate::handlers::validate_request;
use crate::services::session::session_cookie;
use crate::state::AppState;

const RESET_MAIL_SENT_MESSAGE: &str = "パスワードリセットのリンクをメールで送信しました";

// === リセットリクエスト ===

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotRequest {
    #[garde(email)]
    pub email: String,
}

/// POST /account/forgot
///
/// # Security
/// `uniform` 方針ではアカウント不在・送信失敗でも同じ応答を返す
pub async fn forgot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ForgotRequest>,
) -> Result<Json<FlashResponse>, AppError> {
    // バリデーション
    validate_request(&request, "有効なメールアドレスを入力してください")?;

    let origin = resolve_origin(state.config.app_origin.as_deref(), &headers)?;

    let result = state
        .password_reset_service()
        .request_reset(&request.email, &origin)
        .await;

    forgot_outcome(state.config.reset_request_policy, result).map(Json)
}

/// リセット要求の結果を応答方針に従って利用者向けの結果に変換
fn forgot_outcome(
    policy: ResetRequestPolicy,
    result: Result<(), AppError>,
) -> Result<FlashResponse, AppError> {
    match (policy, result) {
        (_, Ok(())) => Ok(FlashResponse::success(RESET_MAIL_SENT_MESSAGE, "/login")),
        (ResetRequestPolicy::Uniform, Err(AppError::AccountNotFound | AppError::Notify(_))) => {
            Ok(FlashResponse::success(RESET_MAIL_SENT_MESSAGE, "/login"))
        }
        (_, Err(e)) => Err(e),
    }
}

/// リセットURLのオリジンを決定
///
/// 設定値を優先し、なければ Host ヘッダーから組み立てる
fn resolve_origin(app_origin: Option<&str>, headers: &HeaderMap) -> Result<String, AppError> {
    if let Some(origin) = app_origin {
        return Ok(origin.trim_end_matches('/').to_string());
    }

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Host ヘッダーがありません".to_string()))?;

    Ok(format!("http://{}", host))
}

// === リセットフォーム表示 ===

#[derive(Debug, Serialize)]
pub struct ResetFormResponse {
    pub title: &'static str,
}

/// GET /account/reset/{token}
///
/// トークンが有効な場合のみフォームを返す
pub async fn reset_form(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ResetFormResponse>, AppError> {
    state.password_reset_service().find_live_user(&token).await?;

    Ok(Json(ResetFormResponse {
        title: "パスワードの再設定",
    }))
}

// === パスワードリセット実行 ===

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[garde(length(min = 8))]
    pub password: String,
    #[serde(rename = "password-confirm")]
    #[garde(skip)]
    pub password_confirm: String,
}

/// POST /account/reset/{token}
///
/// # Security
/// - token, password はログに出力しない
/// - 成功時はそのままログイン状態にする
pub async fn update_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 確認用パスワードの一致を最初に検証（ディレクトリにはアクセスしない）
    confirmed_passwords(&request)?;

    // バリデーション
    validate_request(&request, "パスワードは8文字以上で入力してください")?;

    // リセット処理
    let session = state
        .password_reset_service()
        .consume_reset(&token, &request.password, &request.password_confirm)
        .await?;

    let cookie = session_cookie(
        &state.config.session_cookie_name,
        &session.cookie_value,
        state.config.session_ttl_secs,
    )?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(FlashResponse::success(
            "パスワードを再設定しました。ログイン済みです",
            "/",
        )),
    ))
}

/// 新パスワードと確認用パスワードの一致を確認
fn confirmed_passwords(request: &UpdatePasswordRequest) -> Result<(), AppError> {
    if request.password != request.password_confirm {
        return Err(AppError::CredentialMismatch);
    }
    Ok(())
}
