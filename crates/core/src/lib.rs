//! Core business logic for GopherSocial.

pub mod services;

pub use services::*;
