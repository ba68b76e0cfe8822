//! API handlers

pub mod admin;
pub mod health;
pub mod notifications;
pub mod user;
