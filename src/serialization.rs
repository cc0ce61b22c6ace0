//! serializable read views for student detail, tuition detail and transaction list screens

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::payments::{OtherPaymentRecord, PaymentLedger, PaymentRecord};
use crate::pricing::{DiscountBreakdown, TuitionQuote};
use crate::types::{BillingDomain, DiscountTag, EnrollmentId, PaymentMethod, PaymentStatus, QuoteId};

/// ledger summary for one quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub quote_id: QuoteId,
    pub enrollment_id: EnrollmentId,
    pub grand_total: Money,
    pub total_paid: Money,
    pub remaining_balance: Money,
    pub status: PaymentStatus,
    pub version: u64,
    pub payments: Vec<PaymentLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLine {
    pub id: uuid::Uuid,
    pub invoice_number: String,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub reservation_fee: Money,
    pub tuition_fee: Money,
    pub advance_payment: Money,
    pub amount: Money,
    pub notes: Option<String>,
    pub revision: u32,
}

impl PaymentLine {
    pub fn from_record(record: &PaymentRecord) -> Self {
        PaymentLine {
            id: record.id,
            invoice_number: record.invoice_number.clone(),
            date: record.date,
            method: record.method.clone(),
            reservation_fee: record.reservation_fee(),
            tuition_fee: record.tuition_fee(),
            advance_payment: record.advance_payment(),
            amount: record.amount(),
            notes: record.notes.clone(),
            revision: record.revision,
        }
    }
}

impl LedgerSummary {
    pub fn from_ledger(ledger: &PaymentLedger) -> Self {
        LedgerSummary {
            quote_id: ledger.quote_id(),
            enrollment_id: ledger.quote().enrollment_id,
            grand_total: ledger.grand_total(),
            total_paid: ledger.total_paid(),
            remaining_balance: ledger.remaining_balance(),
            status: ledger.status(),
            version: ledger.version(),
            payments: ledger.payments().iter().map(PaymentLine::from_record).collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// one row of the tuition overview table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuitionRow {
    pub quote_id: QuoteId,
    pub enrollment_id: EnrollmentId,
    pub school_year: String,
    pub grade_level: String,
    pub discount_types: Vec<DiscountTag>,
    pub grand_total: Money,
    pub total_paid: Money,
    pub remaining_balance: Money,
    pub status: PaymentStatus,
}

impl TuitionRow {
    pub fn from_ledger(ledger: &PaymentLedger) -> Self {
        let terms = &ledger.quote().terms;
        TuitionRow {
            quote_id: ledger.quote_id(),
            enrollment_id: ledger.quote().enrollment_id,
            school_year: terms.school_year.clone(),
            grade_level: terms.grade_level.clone(),
            discount_types: terms.discount_breakdown.applied_labels.clone(),
            grand_total: ledger.grand_total(),
            total_paid: ledger.total_paid(),
            remaining_balance: ledger.remaining_balance(),
            status: ledger.status(),
        }
    }
}

/// tuition detail view of a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteView {
    pub id: QuoteId,
    pub enrollment_id: EnrollmentId,
    pub billing_domain: BillingDomain,
    pub school_year: String,
    pub grade_level: String,
    pub revision: u32,
    pub fees: FeeLines,
    pub discounts: DiscountBreakdown,
    pub total_tuition_fee: Money,
    pub total_discount: Money,
    pub grand_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLines {
    pub enrollment_fee: Money,
    pub monthly_tuition: Money,
    pub misc_fee: Money,
    pub pta_fee: Money,
    pub lms_books_fee: Money,
}

impl QuoteView {
    pub fn from_quote(quote: &TuitionQuote) -> Self {
        let terms = &quote.terms;
        let fees = &terms.fee_structure;
        QuoteView {
            id: quote.id,
            enrollment_id: quote.enrollment_id,
            billing_domain: terms.billing_domain,
            school_year: terms.school_year.clone(),
            grade_level: terms.grade_level.clone(),
            revision: quote.revision,
            fees: FeeLines {
                enrollment_fee: fees.enrollment_fee(),
                monthly_tuition: fees.monthly_tuition(),
                misc_fee: fees.misc_fee(),
                pta_fee: fees.pta_fee(),
                lms_books_fee: fees.lms_books_fee(),
            },
            discounts: terms.discount_breakdown.clone(),
            total_tuition_fee: terms.total_tuition_fee,
            total_discount: terms.total_discount(),
            grand_total: terms.grand_total,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Tuition,
    Other,
}

/// one row of the combined transaction list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub kind: TransactionKind,
    pub id: uuid::Uuid,
    pub enrollment_id: EnrollmentId,
    pub invoice_number: String,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub amount: Money,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionEntry {
    pub fn from_payment(record: &PaymentRecord, enrollment_id: EnrollmentId) -> Self {
        let mut parts = Vec::new();
        for (label, amount) in [
            ("reservation", record.reservation_fee()),
            ("tuition", record.tuition_fee()),
            ("advance", record.advance_payment()),
        ] {
            if amount.is_positive() {
                parts.push(format!("{} {}", label, amount));
            }
        }

        TransactionEntry {
            kind: TransactionKind::Tuition,
            id: record.id,
            enrollment_id,
            invoice_number: record.invoice_number.clone(),
            date: record.date,
            method: record.method.clone(),
            amount: record.amount(),
            description: parts.join(", "),
            recorded_at: record.recorded_at,
        }
    }

    pub fn from_other(record: &OtherPaymentRecord) -> Self {
        let description = record
            .items
            .iter()
            .map(|item| format!("{:?} {}", item.category, item.amount))
            .collect::<Vec<_>>()
            .join(", ");

        TransactionEntry {
            kind: TransactionKind::Other,
            id: record.id,
            enrollment_id: record.enrollment_id,
            invoice_number: record.invoice_number.clone(),
            date: record.date,
            method: record.method.clone(),
            amount: record.total_amount(),
            description,
            recorded_at: record.recorded_at,
        }
    }
}
