//! Garde validation utilities.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Validate a struct, mapping the garde report to `DomainError::ValidationError`
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

#[derive(Validate)]
struct Recipient<'a> {
    #[garde(email)]
    address: &'a str,
}

/// Check that an address is a plausible email recipient
pub fn validate_email_recipient(address: &str) -> Result<(), DomainError> {
    Recipient { address }
        .validate()
        .map_err(|_| DomainError::InvalidRecipient(address.to_string()))
}

fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[garde(range(min = 0.0))]
        voltage: Option<f64>,
    }

    #[test]
    fn test_validate_success() {
        let sample = Sample {
            voltage: Some(230.0),
        };
        assert!(validate_struct(&sample).is_ok());
    }

    #[test]
    fn test_validate_error_message_names_the_field() {
        let sample = Sample {
            voltage: Some(-3.0),
        };
        match validate_struct(&sample) {
            Err(DomainError::ValidationError(msg)) => assert!(msg.contains("voltage")),
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_email_recipient() {
        assert!(validate_email_recipient("operator@example.com").is_ok());
        assert!(matches!(
            validate_email_recipient("not-an-address"),
            Err(DomainError::InvalidRecipient(_))
        ));
    }
}
