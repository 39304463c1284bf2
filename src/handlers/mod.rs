pub mod account;
pub mod flash;
pub mod health;
pub mod login;
pub mod logout;
pub mod password_reset;

pub use account::account;
pub use health::health_check;
pub use login::login;
pub use logout::logout;
pub use password_reset::{forgot, reset_form, update_password};

use garde::Validate;

use crate::error::AppError;

/// garde によるリクエスト検証
///
/// garde のレポートはログにのみ出し、利用者には `message` を返す
pub(crate) fn validate_request<T>(request: &T, message: &str) -> Result<(), AppError>
where
    T: Validate,
    T::Context: Default,
{
    request.validate().map_err(|report| {
        tracing::debug!(report = %report, "リクエスト検証エラー");
        AppError::Validation(message.to_string())
    })
}
