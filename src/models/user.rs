use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::reset_token::{PendingReset, is_token_live};

/// ユーザー
///
/// `reset_token_hash` と `reset_token_expires_at` は常に両方セットされるか両方 NULL
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip)]
    pub reset_token_hash: Option<String>,
    #[serde(skip)]
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// 保留中のリセットを取得（片方だけの状態は保留扱いしない）
    pub fn pending_reset(&self) -> Option<PendingReset> {
        match (&self.reset_token_hash, self.reset_token_expires_at) {
            (Some(token_hash), Some(expires_at)) => Some(PendingReset {
                token_hash: token_hash.clone(),
                expires_at,
            }),
            _ => None,
        }
    }

    /// 指定ダイジェストのトークンが `now` 時点で有効か
    pub fn has_live_token(&self, token_hash: &str, now: OffsetDateTime) -> bool {
        self.pending_reset().is_some_and(|pending| {
            pending.token_hash == token_hash
                && is_token_live(Some(pending.token_hash.as_str()), Some(pending.expires_at), now)
        })
    }
}
