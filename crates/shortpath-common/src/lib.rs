//! # Shortpath Common
//!
//! Shared types, errors, and constants used across Shortpath components.
//!
//! ## Modules
//! - `types` - Domain entity (`Node`) and API payloads
//! - `error` - Typed error taxonomy
//! - `constants` - Limits and defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::{InsertError, PathError, ResolveError, StoreError, UrlError};
pub use types::*;
