use std::sync::{Arc, LazyLock};

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserDirectory;

/// ユーザー不在時の照合に使うダミーハッシュ
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("relock-dummy-password").ok());

/// パスワードをargon2idでハッシュ化
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            anyhow::anyhow!("password hash error")
        })?;
    Ok(hash.to_string())
}

/// パスワードを検証
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 認証サービス
#[derive(Clone)]
pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// ユーザー認証を実行
    ///
    /// タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self.directory.find_by_email(email).await?;

        let Some(user) = user else {
            burn_dummy_verification(password);
            tracing::warn!(email = %email, "認証失敗: ユーザー不在");
            return Err(AppError::Authentication("invalid_credentials".to_string()));
        };

        let Some(password_hash) = &user.password_hash else {
            burn_dummy_verification(password);
            tracing::warn!(email = %email, "認証失敗: パスワード未設定");
            return Err(AppError::Authentication("invalid_credentials".to_string()));
        };

        if verify_password(password, password_hash)? {
            tracing::info!(email = %email, "認証成功");
            Ok(user)
        } else {
            tracing::warn!(email = %email, "認証失敗: パスワード不一致");
            Err(AppError::Authentication("invalid_credentials".to_string()))
        }
    }
}

/// 応答時間からユーザーの存在有無を推測されないよう、結果を捨てる照合を行う
fn burn_dummy_verification(password: &str) {
    if let Some(dummy_hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, dummy_hash);
    }
}
