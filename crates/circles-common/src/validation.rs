//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes.

use validator::Validate;

use crate::error::CirclesError;

/// Validate a request body, returning a CirclesError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), CirclesError> {
    body.validate().map_err(|e| CirclesError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate that a frame source/type tag is a short identifier (`files`, `calendar.event`).
pub fn validate_tag(tag: &str) -> Result<(), validator::ValidationError> {
    let valid = !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_tag"))
    }
}
