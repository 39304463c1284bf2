pub mod reset_token;
pub mod session;
pub mod user;

pub use reset_token::{PendingReset, ResetState, ResetToken};
pub use session::Session;
pub use user::User;
