//! Core types for the storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod line_id;
pub mod status;
pub mod tokens;

pub use email::{Email, EmailError};
pub use id::*;
pub use line_id::LineId;
pub use status::OrderStatus;
pub use tokens::Tokens;
