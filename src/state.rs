use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{SessionRepository, UserDirectory, UserRepository};
use crate::services::email::{LogNotifier, Notifier};
use crate::services::password_reset::ResetSettings;
use crate::services::session::{PgSessionGate, SessionGate};
use crate::services::{AuthService, PasswordResetService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// ユーザーディレクトリ
    pub directory: Arc<dyn UserDirectory>,
    /// メール送信
    pub notifier: Arc<dyn Notifier>,
    /// ログインセッション
    pub session_gate: Arc<dyn SessionGate>,
}

impl AppState {
    /// PostgreSQL をバックエンドに AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let directory = Arc::new(UserRepository::new(db_pool.clone()));
        let session_gate = Arc::new(PgSessionGate::new(
            SessionRepository::new(db_pool),
            config.session_ttl_secs,
        ));
        let notifier = build_notifier(&config)?;

        Ok(Self::from_parts(config, directory, notifier, session_gate))
    }

    /// 各コラボレーターを指定して AppState を作成
    pub fn from_parts(
        config: Arc<Config>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        session_gate: Arc<dyn SessionGate>,
    ) -> Self {
        Self {
            config,
            directory,
            notifier,
            session_gate,
        }
    }

    pub fn password_reset_service(&self) -> PasswordResetService {
        PasswordResetService::new(
            self.directory.clone(),
            self.notifier.clone(),
            self.session_gate.clone(),
            ResetSettings::from_config(&self.config),
        )
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.directory.clone())
    }
}

/// SMTP が設定されていれば SMTP、なければログ出力のみの Notifier
fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>, AppError> {
    if let Some(notifier) = smtp_notifier(config)? {
        return Ok(notifier);
    }

    tracing::info!("SMTP 未設定（メールはログ出力のみ）");
    Ok(Arc::new(LogNotifier))
}

#[cfg(feature = "email")]
fn smtp_notifier(config: &Config) -> Result<Option<Arc<dyn Notifier>>, AppError> {
    use secrecy::ExposeSecret;

    use crate::services::email::SmtpNotifier;

    match (
        &config.smtp_host,
        &config.smtp_username,
        &config.smtp_password,
        &config.smtp_from_address,
    ) {
        (Some(host), Some(username), Some(password), Some(from_address)) => {
            tracing::info!(smtp_host = %host, smtp_port = config.smtp_port, "SMTP メール送信を初期化");
            let notifier = SmtpNotifier::new(
                host,
                config.smtp_port,
                username.expose_secret().clone(),
                password.expose_secret().clone(),
                from_address,
            )?;
            Ok(Some(Arc::new(notifier)))
        }
        _ => Ok(None),
    }
}

#[cfg(not(feature = "email"))]
fn smtp_notifier(config: &Config) -> Result<Option<Arc<dyn Notifier>>, AppError> {
    if config.smtp_host.is_some() {
        tracing::warn!("SMTP が設定されていますが email 機能が無効です");
    }
    Ok(None)
}
