//! # circles-common
//!
//! Shared models, configuration, error handling, and utilities used across all Circles crates.
//! This is the foundation layer; protocol logic lives elsewhere.

pub mod any_row;
pub mod auth;
pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod validation;
