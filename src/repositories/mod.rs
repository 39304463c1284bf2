pub mod session;
pub mod user;

pub use session::SessionRepository;
pub use user::{UserDirectory, UserRepository};
