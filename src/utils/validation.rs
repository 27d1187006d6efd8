//! Validation utilities

use crate::types::*;

/// Validate that a setting is not empty
pub fn validate_not_blank(field: &str, value: &str) -> ReconcileResult<()> {
    if value.trim().is_empty() {
        return Err(ReconcileError::Validation(format!(
            "{} cannot be empty",
            field
        )));
    }

    Ok(())
}

/// Validate that a table name is a plain SQL identifier
///
/// Table names cannot be bound as parameters, so only ASCII letters, digits
/// and underscores are accepted, starting with a letter or underscore.
pub fn validate_table_name(name: &str) -> ReconcileResult<()> {
    if name.is_empty() {
        return Err(ReconcileError::Validation(
            "Table name cannot be empty".to_string(),
        ));
    }

    if name.len() > 128 {
        return Err(ReconcileError::Validation(format!(
            "Table name '{}' cannot exceed 128 characters",
            name
        )));
    }

    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_well || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ReconcileError::Validation(format!(
            "Table name '{}' can only contain letters, digits, and underscores",
            name
        )));
    }

    Ok(())
}
