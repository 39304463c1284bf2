use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use http::{HeaderMap, HeaderValue, header::COOKIE};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::models::User;
use crate::models::reset_token::digest_token;
use crate::repositories::SessionRepository;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("セッションストアエラー")]
    Store(#[from] sqlx::Error),

    #[error("Cookieの生成に失敗")]
    Cookie(#[from] http::header::InvalidHeaderValue),
}

/// 確立されたセッション
///
/// `cookie_value` はブラウザに渡す平文。ログに出力しないこと
pub struct EstablishedSession {
    pub cookie_value: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

impl std::fmt::Debug for EstablishedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstablishedSession")
            .field("cookie_value", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// ログイン状態の管理
#[async_trait]
pub trait SessionGate: Send + Sync {
    /// ユーザーのログインセッションを確立
    async fn establish(&self, user: &User) -> Result<EstablishedSession, SessionError>;

    /// Cookie値からログイン中のユーザーIDを取得
    async fn resolve(
        &self,
        cookie_value: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, SessionError>;

    /// セッションを破棄
    async fn revoke(&self, cookie_value: &str) -> Result<(), SessionError>;

    /// `now` 時点で期限切れのセッションを削除し、削除件数を返す
    async fn prune_expired(&self, now: OffsetDateTime) -> Result<u64, SessionError>;
}

/// PostgreSQL に保存するセッション
#[derive(Clone)]
pub struct PgSessionGate {
    session_repo: SessionRepository,
    ttl: Duration,
}

impl PgSessionGate {
    pub fn new(session_repo: SessionRepository, ttl_secs: i64) -> Self {
        Self {
            session_repo,
            ttl: Duration::seconds(ttl_secs),
        }
    }
}

#[async_trait]
impl SessionGate for PgSessionGate {
    async fn establish(&self, user: &User) -> Result<EstablishedSession, SessionError> {
        let cookie_value = generate_session_value();
        let expires_at = OffsetDateTime::now_utc() + self.ttl;

        self.session_repo
            .create(&digest_token(&cookie_value), user.id, expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "セッション確立");

        Ok(EstablishedSession {
            cookie_value,
            user_id: user.id,
            expires_at,
        })
    }

    async fn resolve(
        &self,
        cookie_value: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, SessionError> {
        let session = self
            .session_repo
            .find_live(&digest_token(cookie_value), now)
            .await?;

        Ok(session.map(|s| s.user_id))
    }

    async fn revoke(&self, cookie_value: &str) -> Result<(), SessionError> {
        self.session_repo
            .delete(&digest_token(cookie_value))
            .await?;
        Ok(())
    }

    async fn prune_expired(&self, now: OffsetDateTime) -> Result<u64, SessionError> {
        let pruned = self.session_repo.delete_expired(now).await?;
        if pruned > 0 {
            tracing::debug!(pruned, "期限切れセッションを削除");
        }
        Ok(pruned)
    }
}

/// 期限切れセッションを掃除する（失敗してもログイン処理は続ける）
pub async fn prune_expired_sessions(gate: &dyn SessionGate, now: OffsetDateTime) {
    if let Err(e) = gate.prune_expired(now).await {
        tracing::warn!(error = ?e, "期限切れセッションの削除に失敗");
    }
}

/// 32バイトのランダムなセッション値を生成
pub fn generate_session_value() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// セッションCookie（Set-Cookie 値）を生成
pub fn session_cookie(
    name: &str,
    value: &str,
    max_age_secs: i64,
) -> Result<HeaderValue, SessionError> {
    Ok(HeaderValue::from_str(&format!(
        "{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    ))?)
}

/// セッションCookieを失効させる Set-Cookie 値
pub fn expired_session_cookie(name: &str) -> Result<HeaderValue, SessionError> {
    session_cookie(name, "", 0)
}

/// Cookie ヘッダーから指定名の値を取り出す
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
