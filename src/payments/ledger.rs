use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::pricing::{QuoteTerms, TuitionQuote};
use crate::types::{ArchiveReason, PaymentId, PaymentStatus, QuoteId};

use super::invoice::{InvoiceOwner, InvoiceRegistry};
use super::{
    derive_status, require_remarks, ArchivedPayment, PaymentEdit, PaymentInput, PaymentRecord,
};

/// a past version of the quote, kept when a frozen quote is revised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRevision {
    pub quote: TuitionQuote,
    pub remarks: String,
    pub revised_at: DateTime<Utc>,
    pub revised_by: String,
}

/// ledger figures at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub as_of: DateTime<Utc>,
    pub grand_total: Money,
    pub total_paid: Money,
    pub remaining_balance: Money,
    pub status: PaymentStatus,
    pub payment_count: usize,
}

/// payments recorded against one quote
///
/// Balance and status are computed from `payments` on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLedger {
    quote: TuitionQuote,
    payments: Vec<PaymentRecord>,
    archive: Vec<ArchivedPayment>,
    quote_history: Vec<QuoteRevision>,
    superseded_by: Option<QuoteId>,
    /// bumped on every mutation
    version: u64,
}

impl PaymentLedger {
    pub fn new(quote: TuitionQuote) -> Self {
        Self {
            quote,
            payments: Vec::new(),
            archive: Vec::new(),
            quote_history: Vec::new(),
            superseded_by: None,
            version: 0,
        }
    }

    pub fn quote(&self) -> &TuitionQuote {
        &self.quote
    }

    pub fn quote_id(&self) -> QuoteId {
        self.quote.id
    }

    pub fn grand_total(&self) -> Money {
        self.quote.grand_total()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn payments(&self) -> &[PaymentRecord] {
        &self.payments
    }

    pub fn archive(&self) -> &[ArchivedPayment] {
        &self.archive
    }

    pub fn quote_history(&self) -> &[QuoteRevision] {
        &self.quote_history
    }

    /// deleted payments that can still be restored
    pub fn deleted(&self) -> impl Iterator<Item = &ArchivedPayment> {
        self.archive.iter().filter(|a| a.is_restorable())
    }

    pub fn superseded_by(&self) -> Option<QuoteId> {
        self.superseded_by
    }

    pub fn find(&self, payment_id: PaymentId) -> Option<&PaymentRecord> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    pub fn total_paid(&self) -> Money {
        self.payments.iter().map(PaymentRecord::amount).sum()
    }

    pub fn remaining_balance(&self) -> Money {
        self.grand_total().saturating_sub_floor(self.total_paid())
    }

    pub fn status(&self) -> PaymentStatus {
        derive_status(self.grand_total(), self.total_paid())
    }

    /// any payment, live or archived, freezes the quote's figures
    pub fn is_frozen(&self) -> bool {
        !self.payments.is_empty() || !self.archive.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        match self.superseded_by {
            Some(by) => Err(LedgerError::QuoteSuperseded {
                id: self.quote.id,
                by,
            }),
            None => Ok(()),
        }
    }

    fn check_balance(&self, requested: Money, remaining: Money) -> Result<()> {
        if requested > remaining {
            warn!(
                quote_id = %self.quote.id,
                remaining = %remaining,
                requested = %requested,
                "overpayment rejected"
            );
            return Err(LedgerError::OverpaymentRejected { remaining, requested });
        }
        Ok(())
    }

    /// record a new payment
    ///
    /// Nothing changes, the invoice registry included, unless every check passes.
    pub fn append(
        &mut self,
        payment_id: PaymentId,
        input: PaymentInput,
        now: DateTime<Utc>,
        invoices: &mut InvoiceRegistry,
    ) -> Result<PaymentRecord> {
        self.ensure_open()?;
        input.components.validate()?;
        let requested = input.components.total()?;

        let owner = InvoiceOwner::Payment(payment_id);
        invoices.check_available(&input.invoice_number, owner)?;
        self.check_balance(requested, self.remaining_balance())?;

        let record = PaymentRecord {
            id: payment_id,
            quote_id: self.quote.id,
            invoice_number: input.invoice_number.trim().to_string(),
            components: input.components,
            date: input.date,
            method: input.method,
            notes: input.notes,
            recorded_at: now,
            recorded_by: input.recorded_by,
            revision: 1,
        };

        invoices.reserve(&record.invoice_number, owner)?;
        self.payments.push(record.clone());
        self.version += 1;

        info!(
            quote_id = %self.quote.id,
            payment_id = %record.id,
            invoice = %record.invoice_number,
            amount = %record.amount(),
            remaining = %self.remaining_balance(),
            status = %self.status(),
            "payment recorded"
        );

        Ok(record)
    }

    /// replace a payment with an edited revision; the old one is archived
    pub fn edit(
        &mut self,
        payment_id: PaymentId,
        edit: &PaymentEdit,
        remarks: &str,
        actor: &str,
        now: DateTime<Utc>,
        invoices: &mut InvoiceRegistry,
    ) -> Result<PaymentRecord> {
        let remarks = require_remarks(remarks)?;
        self.ensure_open()?;

        let index = self
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or(LedgerError::PaymentNotFound { id: payment_id })?;
        let current = &self.payments[index];

        let mut next = edit.apply(current);
        next.components.validate()?;

        // balance as if the edited payment were not there
        let paid_elsewhere = self.total_paid().saturating_sub_floor(current.amount());
        let remaining = self.grand_total().saturating_sub_floor(paid_elsewhere);
        self.check_balance(next.components.total()?, remaining)?;

        let owner = InvoiceOwner::Payment(payment_id);
        invoices.reserve(&next.invoice_number, owner)?;

        next.revision = current.revision + 1;
        next.recorded_at = now;
        next.recorded_by = actor.to_string();

        let previous = std::mem::replace(&mut self.payments[index], next.clone());
        info!(
            quote_id = %self.quote.id,
            payment_id = %payment_id,
            old_amount = %previous.amount(),
            new_amount = %next.amount(),
            revision = next.revision,
            "payment edited"
        );
        self.archive.push(ArchivedPayment {
            record: previous,
            reason: ArchiveReason::Edited,
            remarks,
            archived_at: now,
            archived_by: actor.to_string(),
            restored_at: None,
        });
        self.version += 1;

        Ok(next)
    }

    /// move a payment to the archive
    pub fn soft_delete(
        &mut self,
        payment_id: PaymentId,
        remarks: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ArchivedPayment> {
        let remarks = require_remarks(remarks)?;
        self.ensure_open()?;

        let index = self
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or(LedgerError::PaymentNotFound { id: payment_id })?;

        let record = self.payments.remove(index);
        let archived = ArchivedPayment {
            record,
            reason: ArchiveReason::Deleted,
            remarks,
            archived_at: now,
            archived_by: actor.to_string(),
            restored_at: None,
        };
        self.archive.push(archived.clone());
        self.version += 1;

        info!(
            quote_id = %self.quote.id,
            payment_id = %payment_id,
            amount = %archived.record.amount(),
            remaining = %self.remaining_balance(),
            "payment soft-deleted"
        );

        Ok(archived)
    }

    /// put a deleted payment back as a new revision
    ///
    /// The record keeps its id and invoice number and must still fit in the
    /// remaining balance.
    pub fn restore(
        &mut self,
        payment_id: PaymentId,
        remarks: &str,
        actor: &str,
        now: DateTime<Utc>,
        invoices: &mut InvoiceRegistry,
    ) -> Result<PaymentRecord> {
        require_remarks(remarks)?;
        self.ensure_open()?;

        let index = self
            .archive
            .iter()
            .rposition(|a| a.record.id == payment_id && a.is_restorable())
            .ok_or(LedgerError::PaymentNotFound { id: payment_id })?;
        if self.find(payment_id).is_some() {
            return Err(LedgerError::InvariantViolation {
                message: format!("payment {} is both live and deleted", payment_id),
            });
        }

        let deleted = &self.archive[index];
        let owner = InvoiceOwner::Payment(payment_id);
        invoices.check_available(&deleted.record.invoice_number, owner)?;
        self.check_balance(deleted.record.amount(), self.remaining_balance())?;

        let mut record = deleted.record.clone();
        record.revision += 1;
        record.recorded_at = now;
        record.recorded_by = actor.to_string();

        invoices.reserve(&record.invoice_number, owner)?;
        self.archive[index].restored_at = Some(now);
        self.payments.push(record.clone());
        self.version += 1;

        info!(
            quote_id = %self.quote.id,
            payment_id = %payment_id,
            amount = %record.amount(),
            remaining = %self.remaining_balance(),
            "payment restored"
        );

        Ok(record)
    }

    /// audited replacement of frozen quote terms
    ///
    /// Only frozen quotes are revised; an open quote is superseded instead.
    /// The new grand total may not fall below what has already been paid.
    pub fn revise_quote(
        &mut self,
        terms: QuoteTerms,
        remarks: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<&TuitionQuote> {
        let remarks = require_remarks(remarks)?;
        self.ensure_open()?;
        if !self.is_frozen() {
            return Err(LedgerError::QuoteNotFrozen { id: self.quote.id });
        }

        let paid = self.total_paid();
        if terms.grand_total < paid {
            return Err(LedgerError::validation(format!(
                "revised grand total {} is below the {} already paid",
                terms.grand_total, paid
            )));
        }

        let mut revised = self.quote.clone();
        revised.terms = terms;
        revised.revision += 1;

        let previous = std::mem::replace(&mut self.quote, revised);
        info!(
            quote_id = %previous.id,
            old_total = %previous.grand_total(),
            new_total = %self.quote.grand_total(),
            revision = self.quote.revision,
            "frozen quote revised"
        );
        self.quote_history.push(QuoteRevision {
            quote: previous,
            remarks,
            revised_at: now,
            revised_by: actor.to_string(),
        });
        self.version += 1;

        Ok(&self.quote)
    }

    /// retire this ledger in favour of a replacement quote
    pub(crate) fn mark_superseded(&mut self, by: QuoteId) -> Result<()> {
        self.ensure_open()?;
        if self.is_frozen() {
            return Err(LedgerError::QuoteFrozen { id: self.quote.id });
        }
        self.superseded_by = Some(by);
        self.version += 1;
        Ok(())
    }

    /// ledger figures as they stood at `as_of`
    ///
    /// A record counts if it took effect at or before `as_of` and had not yet
    /// been archived. The grand total is the quote revision in force then.
    pub fn snapshot_as_of(&self, as_of: DateTime<Utc>) -> LedgerSnapshot {
        let live = self.payments.iter().filter(|p| p.recorded_at <= as_of);
        let archived = self
            .archive
            .iter()
            .filter(|a| a.record.recorded_at <= as_of && a.archived_at > as_of)
            .map(|a| &a.record);

        let counted: Vec<&PaymentRecord> = live.chain(archived).collect();
        let total_paid: Money = counted.iter().map(|p| p.amount()).sum();

        let grand_total = self
            .quote_history
            .iter()
            .find(|r| r.revised_at > as_of)
            .map(|r| r.quote.grand_total())
            .unwrap_or_else(|| self.grand_total());

        LedgerSnapshot {
            as_of,
            grand_total,
            total_paid,
            remaining_balance: grand_total.saturating_sub_floor(total_paid),
            status: derive_status(grand_total, total_paid),
            payment_count: counted.len(),
        }
    }
}
