use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::config::Config;
use crate::error::AppError;
use crate::models::reset_token::digest_token;
use crate::models::{PendingReset, ResetState, ResetToken, User};
use crate::repositories::UserDirectory;
use crate::services::email::{
    NotifyError, Notifier, PASSWORD_RESET_SUBJECT, PASSWORD_RESET_TEMPLATE, ResetMail,
};
use crate::services::session::{EstablishedSession, SessionGate};

/// リセットトークンの有効期限・送信タイムアウト
#[derive(Debug, Clone, Copy)]
pub struct ResetSettings {
    pub token_ttl: Duration,
    pub notifier_timeout: std::time::Duration,
}

impl ResetSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            token_ttl: Duration::seconds(config.password_reset_token_ttl_secs),
            notifier_timeout: std::time::Duration::from_secs(config.notifier_timeout_secs),
        }
    }
}

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(1),
            notifier_timeout: std::time::Duration::from_secs(10),
        }
    }
}

/// パスワードリセットサービス
///
/// トークンの発行（request）と消費（consume）を扱う。
/// トークン平文・新パスワードはログに出力しない。
#[derive(Clone)]
pub struct PasswordResetService {
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    session_gate: Arc<dyn SessionGate>,
    settings: ResetSettings,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        session_gate: Arc<dyn SessionGate>,
        settings: ResetSettings,
    ) -> Self {
        Self {
            directory,
            notifier,
            session_gate,
            settings,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// `origin` はリセットURLのオリジン（例: `http://localhost:3000`）
    pub async fn request_reset(&self, email: &str, origin: &str) -> Result<(), AppError> {
        self.request_reset_at(email, origin, OffsetDateTime::now_utc())
            .await
    }

    /// 時刻を指定してパスワードリセットをリクエスト
    ///
    /// # Errors
    /// - `AccountNotFound`: 該当ユーザーなし（ディレクトリは変更しない）
    /// - `Database`: トークン保存失敗（メールは送信しない）
    /// - `Notify`: 送信失敗・タイムアウト（保存済みトークンは有効のまま）
    pub async fn request_reset_at(
        &self,
        email: &str,
        origin: &str,
        now: OffsetDateTime,
    ) -> Result<(), AppError> {
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        let user = self.directory.find_by_email(email).await?.ok_or_else(|| {
            tracing::info!(email = %email, "パスワードリセット: ユーザー不在");
            AppError::AccountNotFound
        })?;

        let token = ResetToken::mint();
        let expires_at = now + self.settings.token_ttl;

        // 保存に失敗した場合はここで中断し、メールは送らない
        self.directory
            .persist(
                user.id,
                ResetState::Pending(PendingReset {
                    token_hash: token.digest(),
                    expires_at,
                }),
            )
            .await?;

        let mail = ResetMail {
            template_id: PASSWORD_RESET_TEMPLATE,
            recipient: user.email.clone(),
            subject: PASSWORD_RESET_SUBJECT.to_string(),
            reset_url: build_reset_url(origin, &token),
        };

        match tokio::time::timeout(self.settings.notifier_timeout, self.notifier.send(mail)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(user_id = %user.id, error = %e, "パスワードリセットメール送信失敗");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(user_id = %user.id, "パスワードリセットメール送信タイムアウト");
                return Err(NotifyError::Timeout.into());
            }
        }

        tracing::info!(user_id = %user.id, "パスワードリセットメール送信完了");

        Ok(())
    }

    /// リセットフォーム表示用に有効なトークンのユーザーを取得
    pub async fn find_live_user(&self, token: &str) -> Result<User, AppError> {
        self.find_live_user_at(token, OffsetDateTime::now_utc())
            .await
    }

    pub async fn find_live_user_at(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<User, AppError> {
        let token_hash = digest_token(token);

        self.directory
            .find_by_live_token(&token_hash, now)
            .await?
            .filter(|user| user.has_live_token(&token_hash, now))
            .ok_or(AppError::InvalidOrExpiredToken)
    }

    /// トークンを消費してパスワードを再設定し、そのままログインさせる
    pub async fn consume_reset(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<EstablishedSession, AppError> {
        self.consume_reset_at(
            token,
            new_password,
            confirm_password,
            OffsetDateTime::now_utc(),
        )
        .await
    }

    /// 時刻を指定してトークンを消費
    ///
    /// # Errors
    /// - `CredentialMismatch`: 確認用パスワード不一致（ディレクトリにはアクセスしない）
    /// - `InvalidOrExpiredToken`: トークン不一致・期限切れ・使用済み
    /// - `Database` / `Session`: ストア・セッション確立の失敗
    pub async fn consume_reset_at(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
        now: OffsetDateTime,
    ) -> Result<EstablishedSession, AppError> {
        if new_password != confirm_password {
            return Err(AppError::CredentialMismatch);
        }

        let token_hash = digest_token(token);

        let user = self
            .directory
            .find_by_live_token(&token_hash, now)
            .await?
            .filter(|user| user.has_live_token(&token_hash, now))
            .ok_or_else(|| {
                tracing::warn!("無効または期限切れのリセットトークン");
                AppError::InvalidOrExpiredToken
            })?;

        // 条件付き更新: 並行リクエストが先に消費していれば None
        let user = self
            .directory
            .update_credential_and_clear_token(user.id, &token_hash, new_password, now)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %user.id, "リセットトークンは既に消費済み");
                AppError::InvalidOrExpiredToken
            })?;

        tracing::info!(user_id = %user.id, "パスワードリセット完了");

        let session = self.session_gate.establish(&user).await?;

        Ok(session)
    }
}

/// リセットURLを構築
pub fn build_reset_url(origin: &str, token: &ResetToken) -> String {
    format!(
        "{}/account/reset/{}",
        origin.trim_end_matches('/'),
        token.as_str()
    )
}
