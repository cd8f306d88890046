// src/models/mod.rs

use validator::ValidationError;

pub mod course;
pub mod quiz;
pub mod registration;
pub mod setting;
pub mod unit;
pub mod user;

/// Rejects values that are empty once surrounding whitespace is removed.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_is_blank() {
        assert!(not_blank("   \t").is_err());
        assert!(not_blank("").is_err());
        assert!(not_blank(" Week 1 ").is_ok());
    }
}
