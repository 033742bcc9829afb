//! Core domain types for the Hansard knowledge base

mod error;
mod models;

pub use error::CoreError;
pub use models::*;
