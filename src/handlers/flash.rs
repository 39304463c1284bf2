use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
}

/// 処理成功時のレスポンス（フラッシュメッセージ + リダイレクト先）
#[derive(Debug, Serialize)]
pub struct FlashResponse {
    pub kind: FlashKind,
    pub message: String,
    pub redirect_to: &'static str,
}

impl FlashResponse {
    pub fn success(message: impl Into<String>, redirect_to: &'static str) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
            redirect_to,
        }
    }
}
