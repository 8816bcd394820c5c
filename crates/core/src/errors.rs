use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Engine-level failure taxonomy. Eligibility refusals and coupon
/// rejections are normal values, not errors; only integrity and
/// infrastructure failures travel through this type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Customer-safe wording for the degrade path; internals never leak.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(_) => "The request could not be processed. Check inputs and try again.",
            Self::Persistence(_) | Self::Integration(_) => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Configuration(_) => "An unexpected internal error occurred.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplicationError, DomainError};

    #[test]
    fn domain_error_wraps_transparently() {
        let error =
            ApplicationError::from(DomainError::InvariantViolation("negative discount".to_owned()));
        assert_eq!(error.to_string(), "domain invariant violation: negative discount");
    }

    #[test]
    fn user_messages_never_leak_internals() {
        let error = ApplicationError::Persistence("database lock timeout on coupon".to_owned());
        assert!(!error.user_message().contains("database"));
    }
}
