use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// The remote page range ends before it starts.
    #[error("invalid page range: end page {end_page} is before start page {start_page}")]
    InvalidPageRange { start_page: u32, end_page: u32 },
    /// A table name contains characters that cannot be interpolated into SQL.
    #[error("invalid table name `{0}`: only ASCII letters, digits, `_` and `.` are allowed")]
    InvalidTableName(String),
}

/// Checks that `name` is a plain, optionally schema-qualified, table identifier.
pub(crate) fn validate_table_name(name: &str) -> Result<(), ValidationError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if !valid {
        return Err(ValidationError::InvalidTableName(name.to_string()));
    }

    Ok(())
}

pub(crate) fn ensure_non_zero(field: &str, value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidFieldValue {
            field: field.to_string(),
            constraint: "must be greater than 0".to_string(),
        });
    }

    Ok(())
}
