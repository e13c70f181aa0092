mod auth;
mod health_check;
mod users;

pub use auth::{login, logout, refresh, signup, SessionConfig, REFRESH_COOKIE};
pub use health_check::health_check;
pub use users::get_current_user;
