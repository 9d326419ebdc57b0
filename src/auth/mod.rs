//! Authentication module for the gatehouse server
//!
//! Registration, login and logout, the login guard for account pages, and
//! the session cookie and status-message plumbing they share.

pub mod forms;
pub mod guard;
pub mod handlers;
pub mod messages;
pub mod password;
pub mod service;
pub mod session;

pub use guard::{require_login, CurrentUser};
pub use messages::{Level, Messages, StatusMessage};
pub use password::PasswordPolicy;
pub use service::AuthService;
