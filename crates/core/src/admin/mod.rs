//! Administrative use cases that mutate the stores the routing engine reads.

pub mod contacts;
pub mod operators;
pub mod sources;

pub use contacts::{ContactDirectory, LeadWithContacts};
pub use operators::{OperatorAdmin, OperatorChanges};
pub use sources::{SourceAdmin, WeightAssignment};

use crate::errors::DomainError;

/// Converts an externally supplied integer into a non-negative `u32`.
pub fn non_negative(field: &'static str, value: i64) -> Result<u32, DomainError> {
    if value < 0 {
        return Err(DomainError::NegativeValue { field, value });
    }
    u32::try_from(value).map_err(|_| DomainError::OutOfRange { field, value })
}

fn required_name(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvariantViolation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
