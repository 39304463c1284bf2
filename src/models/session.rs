use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ログインセッション
///
/// `id` はCookie値のSHA256ダイジェスト。Cookie値そのものは保存しない
#[derive(Debug, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}
