use async_trait::async_trait;

/// パスワードリセットメールのテンプレートID
pub const PASSWORD_RESET_TEMPLATE: &str = "password-reset";

/// パスワードリセットメールの件名
pub const PASSWORD_RESET_SUBJECT: &str = "Password Reset";

/// 送信するメール
///
/// reset_url にはトークン平文が含まれるため Debug 出力しない
#[derive(Clone)]
pub struct ResetMail {
    pub template_id: &'static str,
    pub recipient: String,
    pub subject: String,
    pub reset_url: String,
}

impl std::fmt::Debug for ResetMail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetMail")
            .field("template_id", &self.template_id)
            .field("recipient", &self.recipient)
            .field("subject", &self.subject)
            .field("reset_url", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("メール送信がタイムアウトしました")]
    Timeout,

    #[error("未知のテンプレート: {0}")]
    UnknownTemplate(String),

    #[error("メールの組み立てに失敗: {0}")]
    Build(String),

    #[error("メール送信に失敗: {0}")]
    Transport(String),
}

/// メール送信
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: ResetMail) -> Result<(), NotifyError>;
}

/// テンプレートから本文（プレーンテキスト）を生成
pub fn render_body(mail: &ResetMail) -> Result<String, NotifyError> {
    match mail.template_id {
        PASSWORD_RESET_TEMPLATE => Ok(format!(
            "Hello {recipient},\n\n\
             You have requested a password reset. Please click the link below to continue.\n\n\
             {url}\n\n\
             This link expires in one hour. If you did not request this email, please ignore it.\n",
            recipient = mail.recipient,
            url = mail.reset_url,
        )),
        other => Err(NotifyError::UnknownTemplate(other.to_string())),
    }
}

/// メール送信サービス（開発環境: ログ出力のみ）
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, mail: ResetMail) -> Result<(), NotifyError> {
        let body = render_body(&mail)?;

        // 開発モード: メール送信せずログ出力のみ
        tracing::info!(
            to = %mail.recipient,
            template = mail.template_id,
            "パスワードリセットメール送信（開発モード）"
        );
        tracing::debug!(body_len = body.len(), "メール本文生成完了");

        Ok(())
    }
}

#[cfg(feature = "email")]
pub use smtp::SmtpNotifier;

#[cfg(feature = "email")]
mod smtp {
    use async_trait::async_trait;
    use lettre::message::Mailbox;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    use super::{NotifyError, Notifier, ResetMail, render_body};

    /// SMTP でメールを送信
    #[derive(Clone)]
    pub struct SmtpNotifier {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    }

    impl SmtpNotifier {
        pub fn new(
            host: &str,
            port: u16,
            username: String,
            password: String,
            from_address: &str,
        ) -> anyhow::Result<Self> {
            let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
                .port(port)
                .credentials(Credentials::new(username, password))
                .build();
            let from = from_address.parse()?;

            Ok(Self { mailer, from })
        }
    }

    #[async_trait]
    impl Notifier for SmtpNotifier {
        async fn send(&self, mail: ResetMail) -> Result<(), NotifyError> {
            let body = render_body(&mail)?;
            let to: Mailbox = mail
                .recipient
                .parse()
                .map_err(|e: lettre::address::AddressError| NotifyError::Build(e.to_string()))?;

            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(mail.subject.as_str())
                .body(body)
                .map_err(|e| NotifyError::Build(e.to_string()))?;

            self.mailer
                .send(message)
                .await
                .map_err(|e| NotifyError::Transport(e.to_string()))?;

            tracing::info!(to = %mail.recipient, "パスワードリセットメール送信完了");

            Ok(())
        }
    }
}
