//! Common utilities and shared types for GopherSocial.
//!
//! This crate provides foundational components used across all GopherSocial crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Invitation tokens**: Opaque token generation and SHA-256 hashing
//!
//! # Example
//!
//! ```no_run
//! use gophersocial_common::{Config, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     println!("Listening on {}", config.server.addr);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;

pub use config::Config;
pub use crypto::{generate_invitation_token, hash_token};
pub use error::{AppError, AppResult};
