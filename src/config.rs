use std::net::{AddrParseError, SocketAddr};

use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// リセットURLの生成に使うオリジン（例: https://example.com）
    ///
    /// 未設定の場合はリクエストの Host ヘッダーから組み立てる
    #[serde(default)]
    pub app_origin: Option<String>,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_from_address: Option<String>,

    // パスワードリセット設定
    #[serde(default = "default_password_reset_token_ttl_secs")]
    pub password_reset_token_ttl_secs: i64,
    /// メール送信のタイムアウト（秒）
    #[serde(default = "default_notifier_timeout_secs")]
    pub notifier_timeout_secs: u64,
    #[serde(default)]
    pub reset_request_policy: ResetRequestPolicy,

    // セッション設定
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,
}

/// 存在しないメールアドレスでリセット要求された場合の応答方針
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetRequestPolicy {
    /// アカウントの有無に関わらず同じ応答を返す（存在有無の漏洩防止）
    #[default]
    Uniform,
    /// アカウント不在・送信失敗をそのまま利用者に伝える
    Diagnostic,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 3600;
const DEFAULT_NOTIFIER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 14;
const DEFAULT_SESSION_COOKIE_NAME: &str = "relock_session";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_password_reset_token_ttl_secs() -> i64 {
    DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS
}

fn default_notifier_timeout_secs() -> u64 {
    DEFAULT_NOTIFIER_TIMEOUT_SECS
}

fn default_session_ttl_secs() -> i64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_session_cookie_name() -> String {
    DEFAULT_SESSION_COOKIE_NAME.to_string()
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// 環境変数ではなく任意のキー/値ペアから読み込む
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// HOST / PORT から待ち受けアドレスを組み立てる
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let config =
            Config::from_vars(vars(&[("DATABASE_URL", "postgres://localhost/relock")])).unwrap();

        assert_eq!(config.database_url.expose_secret(), "postgres://localhost/relock");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.password_reset_token_ttl_secs, 3600);
        assert_eq!(config.notifier_timeout_secs, 10);
        assert_eq!(config.reset_request_policy, ResetRequestPolicy::Uniform);
        assert_eq!(config.session_cookie_name, "relock_session");
        assert!(config.app_origin.is_none());
    }

    #[test]
    fn test_diagnostic_policy() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/relock"),
            ("RESET_REQUEST_POLICY", "diagnostic"),
        ]))
        .unwrap();

        assert_eq!(config.reset_request_policy, ResetRequestPolicy::Diagnostic);
    }

    #[test]
    fn test_missing_database_url() {
        let result = Config::from_vars(vars(&[("PORT", "8080")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/relock"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_socket_addr_rejects_hostname() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/relock"),
            ("HOST", "localhost"),
        ]))
        .unwrap();

        assert!(config.socket_addr().is_err());
    }
}
