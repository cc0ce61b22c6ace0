use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
    },

    #[error("invariant violation: {message}")]
    InvariantViolation {
        message: String,
    },

    #[error("duplicate invoice number: {invoice_number}")]
    DuplicateInvoice {
        invoice_number: String,
    },

    #[error("overpayment rejected: remaining balance {remaining}, requested {requested}")]
    OverpaymentRejected {
        remaining: Money,
        requested: Money,
    },

    #[error("payment has no reservation, tuition or advance amount")]
    ZeroPayment,

    #[error("concurrency conflict: expected ledger version {expected}, found {actual}")]
    ConcurrencyConflict {
        expected: u64,
        actual: u64,
    },

    #[error("quote not found: {id}")]
    QuoteNotFound {
        id: Uuid,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: Uuid,
    },

    #[error("other payment not found: {id}")]
    OtherPaymentNotFound {
        id: Uuid,
    },

    #[error("no quote registered for enrollment {id}")]
    EnrollmentNotFound {
        id: Uuid,
    },

    #[error("quote {id} has recorded payments and cannot be superseded")]
    QuoteFrozen {
        id: Uuid,
    },

    #[error("quote {id} has no payments yet; supersede it instead of revising")]
    QuoteNotFrozen {
        id: Uuid,
    },

    #[error("quote {id} was superseded by {by}")]
    QuoteSuperseded {
        id: Uuid,
        by: Uuid,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    Config {
        message: String,
    },
}

impl LedgerError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    /// expected business-rule rejections, as opposed to malformed input or bugs
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::DuplicateInvoice { .. }
                | LedgerError::OverpaymentRejected { .. }
                | LedgerError::ZeroPayment
                | LedgerError::QuoteFrozen { .. }
                | LedgerError::QuoteNotFrozen { .. }
                | LedgerError::QuoteSuperseded { .. }
        )
    }

    /// the caller should reload ledger state and retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
