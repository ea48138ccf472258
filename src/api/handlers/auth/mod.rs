//! Authentication endpoints: register, login, logout, refresh, password
//! change, and session management.

pub mod bearer;
pub mod login;
pub mod logout;
pub mod password;
pub mod refresh;
pub mod register;
pub mod sessions;
pub mod state;
pub mod types;
pub mod utils;

pub use state::{AuthConfig, AuthState};
