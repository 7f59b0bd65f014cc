// src/error.rs

use thiserror::Error;

/// Errors surfaced by domain module commands. Each carries a stable code
/// alongside the human-readable message shown by the UI.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{1}")]
    Validation(&'static str, String),
    #[error("{1}")]
    NotFound(&'static str, String),
    #[error("{0}")]
    Internal(String),
}

impl PortalError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PortalError::Validation("VALIDATION_ERROR", msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        PortalError::NotFound("NOT_FOUND", format!("{what} not found"))
    }

    pub fn payment_exceeds_due() -> Self {
        PortalError::Validation("PAYMENT_EXCEEDS_DUE", "Payment exceeds amount due".into())
    }

    pub fn no_unapplied_balance() -> Self {
        PortalError::Validation(
            "NO_UNAPPLIED_BALANCE",
            "No unapplied balance to refund".into(),
        )
    }

    pub fn invoice_not_payable() -> Self {
        PortalError::Validation(
            "INVOICE_NOT_PAYABLE",
            "Invoice not found or no amount due".into(),
        )
    }

    pub fn code(&self) -> &str {
        match self {
            PortalError::Validation(code, _) => code,
            PortalError::NotFound(code, _) => code,
            PortalError::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PortalError::payment_exceeds_due().code(), "PAYMENT_EXCEEDS_DUE");
        assert_eq!(PortalError::not_found("invoice").code(), "NOT_FOUND");
        assert_eq!(PortalError::Internal("x".into()).code(), "INTERNAL");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PortalError::invoice_not_payable().to_string(),
            "Invoice not found or no amount due"
        );
        assert_eq!(PortalError::not_found("policy").to_string(), "policy not found");
    }
}
