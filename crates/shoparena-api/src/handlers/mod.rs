//! API handlers
//!
//! Author: Shoparena developers

pub mod auth;
pub mod health;
pub mod products;
pub mod profile;
