//! Shared Utilities
//!
//! Common types used across all layers.

pub mod error;
pub mod msgid;

pub use error::AppError;
pub use msgid::MessageIdGenerator;
