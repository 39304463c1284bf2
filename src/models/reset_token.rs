use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// トークンのバイト長（256bit）
const TOKEN_BYTES: usize = 32;

/// パスワードリセットトークン（平文）
///
/// 平文はメールのURLにのみ載せ、DBにはSHA256ダイジェストを保存する。
/// Debug 出力では値を伏せる。
#[derive(Clone, PartialEq, Eq)]
pub struct ResetToken(String);

impl ResetToken {
    /// 32バイトのランダムトークンを生成
    pub fn mint() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// DB保存・照合用のダイジェスト
    pub fn digest(&self) -> String {
        digest_token(&self.0)
    }
}

impl std::fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResetToken([REDACTED])")
    }
}

/// トークンをSHA256でハッシュ化（16進数）
pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// トークンが有効か判定
///
/// トークンと有効期限の両方が存在し、かつ `expires_at > now` の場合のみ有効。
/// 期限ちょうどの時刻は期限切れとして扱う。
pub fn is_token_live(
    token_hash: Option<&str>,
    expires_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> bool {
    match (token_hash, expires_at) {
        (Some(_), Some(expires_at)) => expires_at > now,
        _ => false,
    }
}

/// 保留中のリセット（ユーザーレコード上の2フィールド）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReset {
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

/// リセット用フィールドへの書き込み内容
///
/// 「指定なし」は存在せず、常に両フィールドをまとめて書き込む
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetState {
    Pending(PendingReset),
    Cleared,
}

impl ResetState {
    /// DBカラムへの展開（token_hash, expires_at）
    pub fn into_columns(self) -> (Option<String>, Option<OffsetDateTime>) {
        match self {
            Self::Pending(pending) => (Some(pending.token_hash), Some(pending.expires_at)),
            Self::Cleared => (None, None),
        }
    }
}
