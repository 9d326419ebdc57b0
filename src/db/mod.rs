//! Database module for the gatehouse server
//!
//! Identity and session persistence behind the `IdentityStore` and
//! `SessionStore` traits, with a PostgreSQL and an in-memory backend.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::InMemoryStore;
pub use models::{User, UserSession};
pub use operations::{DbPoolStatus, PgStore};
pub use store::{IdentityStore, SessionStore};
