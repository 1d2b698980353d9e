//! Route modules.

pub mod frames;
pub mod health;
pub mod payload;
