use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{ArchiveReason, EnrollmentId, OtherPaymentCategory, OtherPaymentId, PaymentMethod};

use super::invoice::{InvoiceOwner, InvoiceRegistry};
use super::require_remarks;

/// one line of an itemized payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherPaymentItem {
    pub category: OtherPaymentCategory,
    pub amount: Money,
    pub remarks: Option<String>,
}

impl OtherPaymentItem {
    pub fn new(category: OtherPaymentCategory, amount: Money) -> Self {
        Self {
            category,
            amount,
            remarks: None,
        }
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }
}

/// everything about an itemized payment except the items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherPaymentInput {
    pub invoice_number: String,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub recorded_by: String,
}

impl OtherPaymentInput {
    pub fn new(invoice_number: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            invoice_number: invoice_number.into(),
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

/// a recorded itemized (non-tuition) payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherPaymentRecord {
    pub id: OtherPaymentId,
    pub enrollment_id: EnrollmentId,
    pub invoice_number: String,
    pub items: Vec<OtherPaymentItem>,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: String,
    /// 1 on creation, bumped by each edit
    pub revision: u32,
}

impl OtherPaymentRecord {
    /// always the item sum
    pub fn total_amount(&self) -> Money {
        self.items.iter().map(|i| i.amount).sum()
    }
}

/// changes to an itemized payment; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherPaymentEdit {
    pub invoice_number: Option<String>,
    /// replaces the whole item list
    pub items: Option<Vec<OtherPaymentItem>>,
    pub date: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

impl OtherPaymentEdit {
    fn apply(&self, current: &OtherPaymentRecord) -> OtherPaymentRecord {
        let mut next = current.clone();
        if let Some(invoice) = &self.invoice_number {
            next.invoice_number = invoice.trim().to_string();
        }
        if let Some(items) = &self.items {
            next.items = items.clone();
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedOtherPayment {
    pub record: OtherPaymentRecord,
    pub reason: ArchiveReason,
    pub remarks: String,
    pub archived_at: DateTime<Utc>,
    pub archived_by: String,
}

fn validate_items(items: &[OtherPaymentItem]) -> Result<()> {
    if items.is_empty() {
        return Err(LedgerError::validation("an itemized payment needs at least one item"));
    }
    for (i, item) in items.iter().enumerate() {
        if !item.amount.is_positive() {
            return Err(LedgerError::validation(format!(
                "item {} ({:?}) must have a positive amount, got {}",
                i + 1,
                item.category,
                item.amount
            )));
        }
        if let OtherPaymentCategory::Other(label) = &item.category {
            if label.trim().is_empty() {
                return Err(LedgerError::validation(format!("item {} needs a category label", i + 1)));
            }
        }
    }
    Money::try_sum(items.iter().map(|i| i.amount))?;
    Ok(())
}

/// itemized payments for all enrollments
///
/// Separate from the tuition ledgers; only the invoice namespace is shared.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OtherPaymentStore {
    records: Vec<OtherPaymentRecord>,
    archive: Vec<ArchivedOtherPayment>,
}

impl OtherPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        id: OtherPaymentId,
        enrollment_id: EnrollmentId,
        items: Vec<OtherPaymentItem>,
        input: OtherPaymentInput,
        now: DateTime<Utc>,
        invoices: &mut InvoiceRegistry,
    ) -> Result<OtherPaymentRecord> {
        validate_items(&items)?;

        let owner = InvoiceOwner::OtherPayment(id);
        invoices.reserve(&input.invoice_number, owner)?;

        let record = OtherPaymentRecord {
            id,
            enrollment_id,
            invoice_number: input.invoice_number.trim().to_string(),
            items,
            date: input.date,
            method: input.method,
            notes: input.notes,
            recorded_at: now,
            recorded_by: input.recorded_by,
            revision: 1,
        };
        self.records.push(record.clone());

        info!(
            enrollment_id = %enrollment_id,
            payment_id = %id,
            invoice = %record.invoice_number,
            items = record.items.len(),
            total = %record.total_amount(),
            "other payment recorded"
        );

        Ok(record)
    }

    /// replace a record with an edited revision; the old one is archived
    ///
    /// A changed invoice number is reserved for this record and the old
    /// number stays reserved.
    pub fn edit(
        &mut self,
        id: OtherPaymentId,
        edit: &OtherPaymentEdit,
        remarks: &str,
        actor: &str,
        now: DateTime<Utc>,
        invoices: &mut InvoiceRegistry,
    ) -> Result<OtherPaymentRecord> {
        let remarks = require_remarks(remarks)?;
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(LedgerError::OtherPaymentNotFound { id })?;
        let current = &self.records[index];

        let mut next = edit.apply(current);
        validate_items(&next.items)?;
        invoices.reserve(&next.invoice_number, InvoiceOwner::OtherPayment(id))?;

        next.revision = current.revision + 1;
        next.recorded_at = now;
        next.recorded_by = actor.to_string();

        let previous = std::mem::replace(&mut self.records[index], next.clone());
        info!(
            payment_id = %id,
            old_total = %previous.total_amount(),
            new_total = %next.total_amount(),
            revision = next.revision,
            "other payment edited"
        );
        self.archive.push(ArchivedOtherPayment {
            record: previous,
            reason: ArchiveReason::Edited,
            remarks,
            archived_at: now,
            archived_by: actor.to_string(),
        });

        Ok(next)
    }

    pub fn soft_delete(
        &mut self,
        id: OtherPaymentId,
        remarks: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ArchivedOtherPayment> {
        let remarks = require_remarks(remarks)?;
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(LedgerError::OtherPaymentNotFound { id })?;

        let archived = ArchivedOtherPayment {
            record: self.records.remove(index),
            reason: ArchiveReason::Deleted,
            remarks,
            archived_at: now,
            archived_by: actor.to_string(),
        };
        self.archive.push(archived.clone());

        info!(payment_id = %id, total = %archived.record.total_amount(), "other payment soft-deleted");
        Ok(archived)
    }

    pub fn find(&self, id: OtherPaymentId) -> Option<&OtherPaymentRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn records(&self) -> &[OtherPaymentRecord] {
        &self.records
    }

    pub fn for_enrollment(&self, enrollment_id: EnrollmentId) -> Vec<&OtherPaymentRecord> {
        self.records
            .iter()
            .filter(|r| r.enrollment_id == enrollment_id)
            .collect()
    }

    pub fn total_for_enrollment(&self, enrollment_id: EnrollmentId) -> Money {
        self.for_enrollment(enrollment_id)
            .iter()
            .map(|r| r.total_amount())
            .sum()
    }

    /// per-category totals for an enrollment, keyed by category name
    pub fn totals_by_category(&self, enrollment_id: EnrollmentId) -> BTreeMap<String, Money> {
        let mut totals = BTreeMap::new();
        for record in self.for_enrollment(enrollment_id) {
            for item in &record.items {
                let key = match &item.category {
                    OtherPaymentCategory::Other(label) => label.trim().to_string(),
                    category => format!("{:?}", category),
                };
                let total = totals.entry(key).or_insert(Money::ZERO);
                *total = total.saturating_add(item.amount);
            }
        }
        totals
    }

    pub fn archive(&self) -> &[ArchivedOtherPayment] {
        &self.archive
    }
}
