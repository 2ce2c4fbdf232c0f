//! # fieldnet Common Library
//!
//! Shared code for the fieldnet services:
//! - Database schema, migrations and row models
//! - Configuration loading
//! - Payload validation
//! - Password hashing and bearer tokens
//! - Time helpers

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod validation;

pub use error::{Error, Result};
pub use validation::ValidationErrors;
