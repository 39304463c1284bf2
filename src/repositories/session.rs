use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::Session;

#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 新しいセッションを作成
    ///
    /// # Arguments
    /// * `id` - Cookie値のSHA256ダイジェスト
    /// * `user_id` - ログインしたユーザーのID
    /// * `expires_at` - 有効期限
    pub async fn create(
        &self,
        id: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<Session, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, expires_at, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
    }

    /// 有効なセッションを検索
    pub async fn find_live(
        &self,
        id: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, expires_at, created_at
            FROM sessions
            WHERE id = $1 AND expires_at > $2
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }

    /// セッションを削除（存在しなくてもエラーにしない）
    pub async fn delete(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 期限切れのセッションをまとめて削除し、削除件数を返す
    pub async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
