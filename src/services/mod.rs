pub mod auth;
pub mod email;
pub mod password_reset;
pub mod session;

pub use auth::AuthService;
pub use email::{LogNotifier, Notifier};
pub use password_reset::PasswordResetService;
pub use session::SessionGate;
