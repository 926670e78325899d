pub mod password;
pub mod registration;
pub mod session;

pub use password::update_self_password;
pub use registration::{register, verify};
pub use session::{login, login_with_email, logout, send_login_email, token_info};
