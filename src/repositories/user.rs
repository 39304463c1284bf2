use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{ResetState, User};
use crate::services::auth::hash_password;

/// ユーザーディレクトリ（ユーザーレコードの永続化）
///
/// パスワードのハッシュ化はディレクトリ側の責務
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// メールアドレス（完全一致）でユーザーを検索
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    /// ユーザーIDでユーザーを検索
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;

    /// `now` 時点で有効なリセットトークンを持つユーザーを検索
    ///
    /// `reset_token_hash = token_hash AND reset_token_expires_at > now`
    async fn find_by_live_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, sqlx::Error>;

    /// リセット用フィールドを2つまとめて書き込む
    async fn persist(&self, user_id: Uuid, state: ResetState) -> Result<(), sqlx::Error>;

    /// パスワード更新とトークン消去を1回の条件付き更新で行う
    ///
    /// トークンがまだ一致し有効な場合のみ更新し、更新後のユーザーを返す。
    /// 同じトークンでの同時リクエストは片方だけが `Some` を受け取る。
    async fn update_credential_and_clear_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, sqlx::Error>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    /// # Note
    /// DB セットアップ後は `query_as!` マクロに変更してコンパイル時SQL検証を有効にすること
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, reset_token_hash, reset_token_expires_at,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, reset_token_hash, reset_token_expires_at,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_live_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, reset_token_hash, reset_token_expires_at,
                   created_at, updated_at
            FROM users
            WHERE reset_token_hash = $1
              AND reset_token_expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }

    /// # Errors
    /// 対象ユーザーが存在しない場合は `sqlx::Error::RowNotFound`
    async fn persist(&self, user_id: Uuid, state: ResetState) -> Result<(), sqlx::Error> {
        let (token_hash, expires_at) = state.into_columns();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    /// # Note
    /// new_password / password_hash はログに出力しないこと
    async fn update_credential_and_clear_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, sqlx::Error> {
        let password_hash =
            hash_password(new_password).map_err(|e| sqlx::Error::Encode(e.into()))?;
        let (cleared_hash, cleared_expires_at) = ResetState::Cleared.into_columns();

        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $4,
                reset_token_hash = $5,
                reset_token_expires_at = $6,
                updated_at = NOW()
            WHERE id = $1
              AND reset_token_hash = $2
              AND reset_token_expires_at > $3
            RETURNING id, email, password_hash, reset_token_hash, reset_token_expires_at,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .bind(password_hash)
        .bind(cleared_hash)
        .bind(cleared_expires_at)
        .fetch_optional(&self.pool)
        .await
    }
}
