pub mod invoice;
pub mod ledger;
pub mod other;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{ArchiveReason, PaymentId, PaymentMethod, PaymentStatus, QuoteId};

pub use invoice::{InvoiceOwner, InvoiceRegistry};
pub use ledger::{LedgerSnapshot, PaymentLedger, QuoteRevision};
pub use other::{
    ArchivedOtherPayment, OtherPaymentEdit, OtherPaymentInput, OtherPaymentItem, OtherPaymentRecord,
    OtherPaymentStore,
};

/// status from grand total and amount paid
///
/// A zero balance is `Paid` even when nothing was paid (a fully
/// discounted quote).
pub fn derive_status(grand_total: Money, total_paid: Money) -> PaymentStatus {
    if grand_total.saturating_sub_floor(total_paid).is_zero() {
        PaymentStatus::Paid
    } else if total_paid.is_zero() {
        PaymentStatus::Unpaid
    } else {
        PaymentStatus::Partial
    }
}

/// reservation / tuition / advance split of a tuition payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentComponents {
    pub reservation_fee: Money,
    pub tuition_fee: Money,
    pub advance_payment: Money,
}

impl PaymentComponents {
    pub fn new(reservation_fee: Money, tuition_fee: Money, advance_payment: Money) -> Self {
        Self {
            reservation_fee,
            tuition_fee,
            advance_payment,
        }
    }

    /// component sum; errors instead of wrapping on overflow
    pub fn total(&self) -> Result<Money> {
        Money::try_sum([self.reservation_fee, self.tuition_fee, self.advance_payment])
    }

    pub fn validate(&self) -> Result<()> {
        for (name, amount) in [
            ("reservation_fee", self.reservation_fee),
            ("tuition_fee", self.tuition_fee),
            ("advance_payment", self.advance_payment),
        ] {
            if amount.is_negative() {
                return Err(LedgerError::validation(format!(
                    "{} must not be negative, got {}",
                    name, amount
                )));
            }
        }

        if !self.total()?.is_positive() {
            return Err(LedgerError::ZeroPayment);
        }

        Ok(())
    }
}

/// what an admin submits to record a tuition payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInput {
    pub invoice_number: String,
    #[serde(flatten)]
    pub components: PaymentComponents,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub recorded_by: String,
}

impl PaymentInput {
    pub fn new(invoice_number: impl Into<String>, components: PaymentComponents, date: NaiveDate) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            components,
            date,
            method: PaymentMethod::Cash,
            notes: None,
            recorded_by: String::new(),
        }
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn recorded_by(mut self, user: impl Into<String>) -> Self {
        self.recorded_by = user.into();
        self
    }
}

/// a recorded tuition payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub quote_id: QuoteId,
    pub invoice_number: String,
    #[serde(flatten)]
    pub components: PaymentComponents,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    /// when this revision took effect
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: String,
    /// 1 on creation, bumped by each edit
    pub revision: u32,
}

impl PaymentRecord {
    /// always the component sum
    ///
    /// Records only enter a ledger after their components validate, so the
    /// saturating sum never actually saturates.
    pub fn amount(&self) -> Money {
        let c = &self.components;
        c.reservation_fee
            .saturating_add(c.tuition_fee)
            .saturating_add(c.advance_payment)
    }

    pub fn reservation_fee(&self) -> Money {
        self.components.reservation_fee
    }

    pub fn tuition_fee(&self) -> Money {
        self.components.tuition_fee
    }

    pub fn advance_payment(&self) -> Money {
        self.components.advance_payment
    }
}

/// changes to an existing payment; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEdit {
    pub invoice_number: Option<String>,
    pub reservation_fee: Option<Money>,
    pub tuition_fee: Option<Money>,
    pub advance_payment: Option<Money>,
    pub date: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

impl PaymentEdit {
    pub(crate) fn apply(&self, current: &PaymentRecord) -> PaymentRecord {
        let mut next = current.clone();
        if let Some(invoice) = &self.invoice_number {
            next.invoice_number = invoice.trim().to_string();
        }
        if let Some(amount) = self.reservation_fee {
            next.components.reservation_fee = amount;
        }
        if let Some(amount) = self.tuition_fee {
            next.components.tuition_fee = amount;
        }
        if let Some(amount) = self.advance_payment {
            next.components.advance_payment = amount;
        }
        if let Some(date) = self.date {
            next.date = date;
        }
        if let Some(method) = &self.method {
            next.method = method.clone();
        }
        if let Some(notes) = &self.notes {
            next.notes = Some(notes.clone());
        }
        next
    }
}

/// a record that left the live ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedPayment {
    pub record: PaymentRecord,
    pub reason: ArchiveReason,
    pub remarks: String,
    pub archived_at: DateTime<Utc>,
    pub archived_by: String,
    /// set once a deleted record is put back in the live ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_at: Option<DateTime<Utc>>,
}

impl ArchivedPayment {
    /// deleted and not yet restored
    pub fn is_restorable(&self) -> bool {
        self.reason == ArchiveReason::Deleted && self.restored_at.is_none()
    }
}

/// trimmed, non-empty remarks for an edit or delete
pub(crate) fn require_remarks(remarks: &str) -> Result<String> {
    let trimmed = remarks.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation("remarks are required to change a recorded payment"));
    }
    Ok(trimmed.to_string())
}
