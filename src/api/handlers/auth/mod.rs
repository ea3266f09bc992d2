//! Authentication gateway and account entry points.
//!
//! Flow Overview:
//! 1) `POST /api/auth/login` checks a bcrypt hash and issues a 24h session token.
//! 2) Every protected route runs [`gateway::require_auth`], which turns the bearer token
//!    into a [`Principal`] request extension or answers `401`.
//! 3) Admin-only handlers call [`Principal::require_admin`] and answer `403` otherwise.

pub mod gateway;
pub mod login;
pub mod register;
pub mod state;
pub(crate) mod storage;
pub mod verify;

pub use gateway::{Principal, extract_bearer_token, require_auth};
pub use state::AuthState;
