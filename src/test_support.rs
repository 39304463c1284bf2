//! テスト用のインメモリ実装

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{ResetState, User};
use crate::models::reset_token::digest_token;
use crate::repositories::UserDirectory;
use crate::services::auth::hash_password;
use crate::services::email::{NotifyError, Notifier, ResetMail};
use crate::services::session::{
    EstablishedSession, SessionError, SessionGate, generate_session_value,
};
use crate::state::AppState;

/// 呼び出し回数・変更回数を数えるディレクトリ
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<Uuid, User>>,
    calls: AtomicUsize,
    mutations: AtomicUsize,
    fail_persist: AtomicBool,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, email: &str, password: Option<&str>) -> User {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password.map(|p| hash_password(p).unwrap()),
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        user
    }

    pub fn get(&self, user_id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&user_id).cloned()
    }

    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    /// トレイトメソッドの呼び出し回数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 成功した書き込みの回数
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        self.record_call();
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        self.record_call();
        Ok(self.get(user_id))
    }

    async fn find_by_live_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, sqlx::Error> {
        self.record_call();
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .find(|u| u.has_live_token(token_hash, now))
            .cloned())
    }

    async fn persist(&self, user_id: Uuid, state: ResetState) -> Result<(), sqlx::Error> {
        self.record_call();
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }

        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(sqlx::Error::RowNotFound)?;
        let (token_hash, expires_at) = state.into_columns();
        user.reset_token_hash = token_hash;
        user.reset_token_expires_at = expires_at;
        user.updated_at = OffsetDateTime::now_utc();
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_credential_and_clear_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, sqlx::Error> {
        self.record_call();
        let password_hash =
            hash_password(new_password).map_err(|e| sqlx::Error::Encode(e.into()))?;

        // 照合と更新を同じロック内で行う
        let mut users = self.users.lock().unwrap();
        let Some(user) = users
            .get_mut(&user_id)
            .filter(|u| u.has_live_token(token_hash, now))
        else {
            return Ok(None);
        };

        let (token_hash, expires_at) = ResetState::Cleared.into_columns();
        user.password_hash = Some(password_hash);
        user.reset_token_hash = token_hash;
        user.reset_token_expires_at = expires_at;
        user.updated_at = OffsetDateTime::now_utc();
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(Some(user.clone()))
    }
}

/// 送信内容を記録する Notifier
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<ResetMail>>,
    fail: bool,
    delay: Option<std::time::Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録したうえで送信失敗を返す
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// 送信前に `delay` だけ待つ
    pub fn slow(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<ResetMail> {
        self.sent.lock().unwrap().clone()
    }

    /// 最後に送ったリセットURLからトークン平文を取り出す
    pub fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let mail = sent.last()?;
        mail.reset_url
            .rsplit_once("/account/reset/")
            .map(|(_, token)| token.to_string())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, mail: ResetMail) -> Result<(), NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(mail);
        if self.fail {
            return Err(NotifyError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

/// インメモリのセッション
#[derive(Default)]
pub struct InMemorySessionGate {
    sessions: Mutex<HashMap<String, (Uuid, OffsetDateTime)>>,
    established: AtomicUsize,
    fail_establish: AtomicBool,
    fail_prune: AtomicBool,
}

impl InMemorySessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn established_count(&self) -> usize {
        self.established.load(Ordering::SeqCst)
    }

    pub fn fail_establish(&self, fail: bool) {
        self.fail_establish.store(fail, Ordering::SeqCst);
    }

    pub fn fail_prune(&self, fail: bool) {
        self.fail_prune.store(fail, Ordering::SeqCst);
    }

    /// 期限を指定してセッションを直接登録し、Cookie値を返す
    pub fn insert_session(&self, user_id: Uuid, expires_at: OffsetDateTime) -> String {
        let cookie_value = generate_session_value();
        self.sessions
            .lock()
            .unwrap()
            .insert(digest_token(&cookie_value), (user_id, expires_at));
        cookie_value
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionGate for InMemorySessionGate {
    async fn establish(&self, user: &User) -> Result<EstablishedSession, SessionError> {
        if self.fail_establish.load(Ordering::SeqCst) {
            return Err(SessionError::Store(sqlx::Error::PoolTimedOut));
        }

        let cookie_value = generate_session_value();
        // テストは固定時刻を使うため、十分先の期限にしておく
        let expires_at = OffsetDateTime::now_utc() + Duration::days(3650);
        self.sessions
            .lock()
            .unwrap()
            .insert(digest_token(&cookie_value), (user.id, expires_at));
        self.established.fetch_add(1, Ordering::SeqCst);

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
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(&digest_token(cookie_value))
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(user_id, _)| *user_id))
    }

    async fn revoke(&self, cookie_value: &str) -> Result<(), SessionError> {
        self.sessions
            .lock()
            .unwrap()
            .remove(&digest_token(cookie_value));
        Ok(())
    }

    async fn prune_expired(&self, now: OffsetDateTime) -> Result<u64, SessionError> {
        if self.fail_prune.load(Ordering::SeqCst) {
            return Err(SessionError::Store(sqlx::Error::PoolTimedOut));
        }

        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

/// インメモリ実装で組み立てた AppState
pub struct TestApp {
    pub state: AppState,
    pub directory: Arc<InMemoryUserDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub session_gate: Arc<InMemorySessionGate>,
}

impl TestApp {
    /// 追加の環境変数（`DATABASE_URL` 以外）を指定して作成
    pub fn with_env(pairs: &[(&str, &str)]) -> Self {
        let vars = std::iter::once((
            "DATABASE_URL".to_string(),
            "postgres://localhost/relock_test".to_string(),
        ))
        .chain(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        let config = Config::from_vars(vars).unwrap();

        let directory = Arc::new(InMemoryUserDirectory::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let session_gate = Arc::new(InMemorySessionGate::new());
        let state = AppState::from_parts(
            Arc::new(config),
            directory.clone(),
            notifier.clone(),
            session_gate.clone(),
        );

        Self {
            state,
            directory,
            notifier,
            session_gate,
        }
    }
}
