//! HTTP handlers for admission-service.

pub mod auth;
pub mod health;
