pub mod accounts;
pub mod password;

pub use accounts::AuthService;
pub use password::{hash_password, verify_password};
