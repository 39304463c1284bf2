use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::services::email::NotifyError;
use crate::services::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("認証エラー: {0}")]
    Authentication(String),

    #[error("ログインが必要です")]
    Unauthenticated,

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("メール送信エラー")]
    Notify(#[from] NotifyError),

    #[error("セッションエラー")]
    Session(#[from] SessionError),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),

    #[error("このメールアドレスのアカウントは存在しません")]
    AccountNotFound,

    #[error("無効または期限切れのリンクです")]
    InvalidOrExpiredToken,

    #[error("パスワードが一致しません")]
    CredentialMismatch,
}

/// エラー時のレスポンス
///
/// `redirect_to` が None の場合は元の画面に留まる
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<&'static str>,
}

impl AppError {
    /// HTTPステータス・利用者向けメッセージ・リダイレクト先を決定
    fn parts(&self) -> (StatusCode, String, Option<&'static str>) {
        match self {
            Self::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "メールアドレスまたはパスワードが正しくありません".to_string(),
                Some("/login"),
            ),
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "ログインしてから操作してください".to_string(),
                Some("/login"),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                    None,
                )
            }
            Self::Notify(e) => {
                tracing::error!(error = ?e, "メール送信エラー");
                (
                    StatusCode::BAD_GATEWAY,
                    "メールの送信に失敗しました".to_string(),
                    Some("/login"),
                )
            }
            Self::Session(e) => {
                tracing::error!(error = ?e, "セッションエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ログイン状態の確立に失敗しました".to_string(),
                    Some("/login"),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                    None,
                )
            }
            Self::AccountNotFound => (
                StatusCode::NOT_FOUND,
                "このメールアドレスのアカウントは存在しません".to_string(),
                Some("/login"),
            ),
            Self::InvalidOrExpiredToken => (
                StatusCode::BAD_REQUEST,
                "パスワードリセットのリンクが無効か期限切れです".to_string(),
                Some("/login"),
            ),
            Self::CredentialMismatch => (
                StatusCode::BAD_REQUEST,
                "パスワードが一致しません".to_string(),
                None,
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, redirect_to) = self.parts();

        (
            status,
            Json(ErrorResponse {
                error: message,
                redirect_to,
            }),
        )
            .into_response()
    }
}
