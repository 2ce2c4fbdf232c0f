//! HTTP API handlers for fieldnet-api

pub mod auth;
pub mod health;
pub mod nodes;
pub mod payload;
pub mod ripener;
pub mod storage;
pub mod users;
pub mod visitors;
pub mod weather;

pub use auth::{AdminUser, AuthUser, OptionalUser};
pub use health::health_routes;
