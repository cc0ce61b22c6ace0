use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{ActivityAction, ActivityEntry, ActivitySink, EntityType};
use crate::payments::{
    ArchivedPayment, InvoiceRegistry, LedgerSnapshot, OtherPaymentEdit, OtherPaymentInput,
    OtherPaymentItem, OtherPaymentRecord, OtherPaymentStore, PaymentEdit, PaymentInput,
    PaymentLedger, PaymentRecord,
};
use crate::pricing::{DiscountBreakdown, DiscountElection, DiscountPolicy, FeeStructure, QuoteTerms, TuitionQuote};
use crate::serialization::{LedgerSummary, TransactionEntry, TuitionRow};
use crate::types::{BillingDomain, EnrollmentId, OtherPaymentId, PaymentId, QuoteId};

type SharedLedger = Arc<Mutex<PaymentLedger>>;

// a panic can't leave a ledger half-written: every mutation validates first
// and commits with a single push/replace
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Owns every quote, ledger and itemized payment, and the invoice namespace.
///
/// Appends against one quote are serialized by that quote's mutex, so the
/// overpayment check and the write happen under one lock. Lock order is
/// ledger, then other payments, then invoices.
pub struct BillingBook {
    configs: HashMap<BillingDomain, BillingConfig>,
    ledgers: RwLock<HashMap<QuoteId, SharedLedger>>,
    enrollments: RwLock<HashMap<EnrollmentId, QuoteId>>,
    payment_index: RwLock<HashMap<PaymentId, QuoteId>>,
    other_payments: Mutex<OtherPaymentStore>,
    invoices: Mutex<InvoiceRegistry>,
    activity: Arc<dyn ActivitySink>,
}

impl BillingBook {
    /// create a book with the default configuration for both billing domains
    pub fn new(activity: Arc<dyn ActivitySink>) -> Self {
        let configs = [BillingDomain::NewEnrollment, BillingDomain::OldEnrollment]
            .into_iter()
            .map(|d| (d, BillingConfig::for_domain(d)))
            .collect();

        Self {
            configs,
            ledgers: RwLock::new(HashMap::new()),
            enrollments: RwLock::new(HashMap::new()),
            payment_index: RwLock::new(HashMap::new()),
            other_payments: Mutex::new(OtherPaymentStore::new()),
            invoices: Mutex::new(InvoiceRegistry::new()),
            activity,
        }
    }

    /// replace one domain's configuration
    pub fn with_config(mut self, config: BillingConfig) -> Result<Self> {
        config.validate()?;
        self.configs.insert(config.domain, config);
        Ok(self)
    }

    pub fn config(&self, domain: BillingDomain) -> &BillingConfig {
        // both domains are inserted by `new`
        &self.configs[&domain]
    }

    fn emit(
        &self,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: Uuid,
        details: String,
        user: &str,
        timestamp: DateTime<Utc>,
    ) {
        self.activity.record(ActivityEntry {
            action,
            entity_type,
            entity_id,
            details,
            timestamp,
            user: user.to_string(),
        });
    }

    fn ledger(&self, quote_id: QuoteId) -> Result<SharedLedger> {
        read(&self.ledgers)
            .get(&quote_id)
            .cloned()
            .ok_or(LedgerError::QuoteNotFound { id: quote_id })
    }

    fn ledger_for_payment(&self, payment_id: PaymentId) -> Result<SharedLedger> {
        let quote_id = read(&self.payment_index)
            .get(&payment_id)
            .copied()
            .ok_or(LedgerError::PaymentNotFound { id: payment_id })?;
        self.ledger(quote_id)
    }

    // ---- pricing ----

    pub fn compute_discounts(
        &self,
        domain: BillingDomain,
        fees: &FeeStructure,
        election: &DiscountElection,
    ) -> Result<DiscountBreakdown> {
        DiscountPolicy::new(self.config(domain)).compute(fees, election)
    }

    pub fn build_quote(
        &self,
        domain: BillingDomain,
        fees: FeeStructure,
        election: DiscountElection,
        school_year: &str,
        grade_level: &str,
    ) -> Result<QuoteTerms> {
        QuoteTerms::compute(self.config(domain), fees, election, school_year, grade_level)
    }

    /// register the billing baseline for an enrollment
    pub fn create_quote(
        &self,
        enrollment_id: EnrollmentId,
        terms: QuoteTerms,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<TuitionQuote> {
        let quote = TuitionQuote::new(Uuid::new_v4(), enrollment_id, terms);

        {
            let mut enrollments = write(&self.enrollments);
            if let Some(existing) = enrollments.get(&enrollment_id) {
                return Err(LedgerError::validation(format!(
                    "enrollment {} already has quote {}; supersede or revise it instead",
                    enrollment_id, existing
                )));
            }
            write(&self.ledgers).insert(quote.id, Arc::new(Mutex::new(PaymentLedger::new(quote.clone()))));
            enrollments.insert(enrollment_id, quote.id);
        }

        info!(
            quote_id = %quote.id,
            enrollment_id = %enrollment_id,
            grand_total = %quote.grand_total(),
            "quote created"
        );
        self.emit(
            ActivityAction::QuoteCreated,
            EntityType::Quote,
            quote.id,
            format!(
                "{} {} grand total {}",
                quote.terms.school_year,
                quote.terms.grade_level,
                quote.grand_total()
            ),
            actor,
            time.now(),
        );

        Ok(quote)
    }

    /// replace a quote that has no payments with a fresh one
    pub fn supersede_quote(
        &self,
        quote_id: QuoteId,
        terms: QuoteTerms,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<TuitionQuote> {
        let shared = self.ledger(quote_id)?;
        let mut old = lock(&shared);

        let mut replacement = TuitionQuote::new(Uuid::new_v4(), old.quote().enrollment_id, terms);
        replacement.supersedes = Some(quote_id);
        old.mark_superseded(replacement.id)?;

        write(&self.ledgers).insert(
            replacement.id,
            Arc::new(Mutex::new(PaymentLedger::new(replacement.clone()))),
        );
        write(&self.enrollments).insert(replacement.enrollment_id, replacement.id);

        info!(
            old_quote = %quote_id,
            new_quote = %replacement.id,
            "quote superseded"
        );
        self.emit(
            ActivityAction::QuoteSuperseded,
            EntityType::Quote,
            quote_id,
            format!(
                "superseded by {}: grand total {} -> {}",
                replacement.id,
                old.grand_total(),
                replacement.grand_total()
            ),
            actor,
            time.now(),
        );

        Ok(replacement)
    }

    /// explicit, audited change to a quote's figures after payments exist
    pub fn revise_frozen_quote(
        &self,
        quote_id: QuoteId,
        terms: QuoteTerms,
        remarks: &str,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<TuitionQuote> {
        let shared = self.ledger(quote_id)?;
        let mut ledger = lock(&shared);
        let old_total = ledger.grand_total();
        let now = time.now();

        let revised = ledger.revise_quote(terms, remarks, actor, now)?.clone();

        self.emit(
            ActivityAction::QuoteRevised,
            EntityType::Quote,
            quote_id,
            format!(
                "revision {}: grand total {} -> {}; remarks: {}",
                revised.revision,
                old_total,
                revised.grand_total(),
                remarks.trim()
            ),
            actor,
            now,
        );

        Ok(revised)
    }

    pub fn quote(&self, quote_id: QuoteId) -> Result<TuitionQuote> {
        let shared = self.ledger(quote_id)?;
        let ledger = lock(&shared);
        Ok(ledger.quote().clone())
    }

    pub fn current_quote(&self, enrollment_id: EnrollmentId) -> Result<TuitionQuote> {
        let quote_id = read(&self.enrollments)
            .get(&enrollment_id)
            .copied()
            .ok_or(LedgerError::EnrollmentNotFound { id: enrollment_id })?;
        self.quote(quote_id)
    }

    // ---- tuition payments ----

    pub fn append_payment(
        &self,
        quote_id: QuoteId,
        input: PaymentInput,
        time: &SafeTimeProvider,
    ) -> Result<PaymentRecord> {
        self.append_payment_inner(quote_id, input, None, time)
    }

    /// optimistic append: fails with `ConcurrencyConflict` if the ledger moved
    /// past `expected_version` since the caller read it
    pub fn append_payment_expecting(
        &self,
        quote_id: QuoteId,
        input: PaymentInput,
        expected_version: u64,
        time: &SafeTimeProvider,
    ) -> Result<PaymentRecord> {
        self.append_payment_inner(quote_id, input, Some(expected_version), time)
    }

    fn append_payment_inner(
        &self,
        quote_id: QuoteId,
        input: PaymentInput,
        expected_version: Option<u64>,
        time: &SafeTimeProvider,
    ) -> Result<PaymentRecord> {
        let shared = self.ledger(quote_id)?;
        let mut ledger = lock(&shared);

        if let Some(expected) = expected_version {
            if ledger.version() != expected {
                warn!(quote_id = %quote_id, expected, actual = ledger.version(), "stale ledger version");
                return Err(LedgerError::ConcurrencyConflict {
                    expected,
                    actual: ledger.version(),
                });
            }
        }

        let now = time.now();
        let record = {
            let mut invoices = lock(&self.invoices);
            ledger.append(Uuid::new_v4(), input, now, &mut invoices)?
        };
        write(&self.payment_index).insert(record.id, quote_id);

        self.emit(
            ActivityAction::PaymentRecorded,
            EntityType::Payment,
            record.id,
            format!(
                "invoice {} amount {} (reservation {}, tuition {}, advance {}); balance {} {}",
                record.invoice_number,
                record.amount(),
                record.reservation_fee(),
                record.tuition_fee(),
                record.advance_payment(),
                ledger.remaining_balance(),
                ledger.status()
            ),
            &record.recorded_by,
            now,
        );

        Ok(record)
    }

    pub fn edit_payment(
        &self,
        payment_id: PaymentId,
        edit: PaymentEdit,
        remarks: &str,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<PaymentRecord> {
        let shared = self.ledger_for_payment(payment_id)?;
        let mut ledger = lock(&shared);
        let old_amount = ledger
            .find(payment_id)
            .map(PaymentRecord::amount)
            .ok_or(LedgerError::PaymentNotFound { id: payment_id })?;

        let now = time.now();
        let record = {
            let mut invoices = lock(&self.invoices);
            ledger.edit(payment_id, &edit, remarks, actor, now, &mut invoices)?
        };

        self.emit(
            ActivityAction::PaymentEdited,
            EntityType::Payment,
            payment_id,
            format!(
                "invoice {} amount {} -> {} (revision {}); remarks: {}",
                record.invoice_number,
                old_amount,
                record.amount(),
                record.revision,
                remarks.trim()
            ),
            actor,
            now,
        );

        Ok(record)
    }

    pub fn soft_delete_payment(
        &self,
        payment_id: PaymentId,
        remarks: &str,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        let shared = self.ledger_for_payment(payment_id)?;
        let mut ledger = lock(&shared);
        let now = time.now();
        let archived = ledger.soft_delete(payment_id, remarks, actor, now)?;

        self.emit(
            ActivityAction::PaymentDeleted,
            EntityType::Payment,
            payment_id,
            format!(
                "invoice {} amount {} archived; remarks: {}",
                archived.record.invoice_number,
                archived.record.amount(),
                archived.remarks
            ),
            actor,
            now,
        );

        Ok(())
    }

    /// deleted tuition payments across every ledger, most recently deleted first
    pub fn deleted_payments(&self) -> Vec<ArchivedPayment> {
        let ledgers: Vec<SharedLedger> = read(&self.ledgers).values().cloned().collect();
        let mut deleted: Vec<ArchivedPayment> = ledgers
            .iter()
            .flat_map(|shared| lock(shared).deleted().cloned().collect::<Vec<_>>())
            .collect();
        deleted.sort_by(|a, b| b.archived_at.cmp(&a.archived_at));
        deleted
    }

    /// bring a soft-deleted payment back under its original id and invoice
    pub fn restore_payment(
        &self,
        payment_id: PaymentId,
        remarks: &str,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<PaymentRecord> {
        let shared = self.ledger_for_payment(payment_id)?;
        let mut ledger = lock(&shared);

        let now = time.now();
        let record = {
            let mut invoices = lock(&self.invoices);
            ledger.restore(payment_id, remarks, actor, now, &mut invoices)?
        };

        self.emit(
            ActivityAction::PaymentRestored,
            EntityType::Payment,
            payment_id,
            format!(
                "invoice {} amount {} restored (revision {}); balance {} {}; remarks: {}",
                record.invoice_number,
                record.amount(),
                record.revision,
                ledger.remaining_balance(),
                ledger.status(),
                remarks.trim()
            ),
            actor,
            now,
        );

        Ok(record)
    }

    pub fn ledger_summary(&self, quote_id: QuoteId) -> Result<LedgerSummary> {
        let shared = self.ledger(quote_id)?;
        let ledger = lock(&shared);
        Ok(LedgerSummary::from_ledger(&ledger))
    }

    pub fn ledger_snapshot_as_of(&self, quote_id: QuoteId, as_of: DateTime<Utc>) -> Result<LedgerSnapshot> {
        let shared = self.ledger(quote_id)?;
        let ledger = lock(&shared);
        Ok(ledger.snapshot_as_of(as_of))
    }

    // ---- itemized payments ----

    pub fn append_other_payment(
        &self,
        enrollment_id: EnrollmentId,
        items: Vec<OtherPaymentItem>,
        input: OtherPaymentInput,
        time: &SafeTimeProvider,
    ) -> Result<OtherPaymentRecord> {
        if !read(&self.enrollments).contains_key(&enrollment_id) {
            return Err(LedgerError::EnrollmentNotFound { id: enrollment_id });
        }

        let now = time.now();
        let record = {
            let mut store = lock(&self.other_payments);
            let mut invoices = lock(&self.invoices);
            store.append(Uuid::new_v4(), enrollment_id, items, input, now, &mut invoices)?
        };

        self.emit(
            ActivityAction::OtherPaymentRecorded,
            EntityType::OtherPayment,
            record.id,
            format!(
                "invoice {} total {} across {} item(s)",
                record.invoice_number,
                record.total_amount(),
                record.items.len()
            ),
            &record.recorded_by,
            now,
        );

        Ok(record)
    }

    pub fn edit_other_payment(
        &self,
        payment_id: OtherPaymentId,
        edit: OtherPaymentEdit,
        remarks: &str,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<OtherPaymentRecord> {
        let now = time.now();
        let (old_total, record) = {
            let mut store = lock(&self.other_payments);
            let old_total = store
                .find(payment_id)
                .map(OtherPaymentRecord::total_amount)
                .ok_or(LedgerError::OtherPaymentNotFound { id: payment_id })?;
            let mut invoices = lock(&self.invoices);
            let record = store.edit(payment_id, &edit, remarks, actor, now, &mut invoices)?;
            (old_total, record)
        };

        self.emit(
            ActivityAction::OtherPaymentEdited,
            EntityType::OtherPayment,
            payment_id,
            format!(
                "invoice {} total {} -> {} (revision {}); remarks: {}",
                record.invoice_number,
                old_total,
                record.total_amount(),
                record.revision,
                remarks.trim()
            ),
            actor,
            now,
        );

        Ok(record)
    }

    pub fn soft_delete_other_payment(
        &self,
        payment_id: OtherPaymentId,
        remarks: &str,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time.now();
        let archived = lock(&self.other_payments).soft_delete(payment_id, remarks, actor, now)?;

        self.emit(
            ActivityAction::OtherPaymentDeleted,
            EntityType::OtherPayment,
            payment_id,
            format!(
                "invoice {} total {} archived; remarks: {}",
                archived.record.invoice_number,
                archived.record.total_amount(),
                archived.remarks
            ),
            actor,
            now,
        );

        Ok(())
    }

    pub fn other_payments_total(&self, enrollment_id: EnrollmentId) -> Money {
        lock(&self.other_payments).total_for_enrollment(enrollment_id)
    }

    fn collect_transactions(&self, enrollment: Option<EnrollmentId>) -> Vec<TransactionEntry> {
        let wanted = |id: EnrollmentId| enrollment.map_or(true, |e| e == id);
        let ledgers: Vec<SharedLedger> = read(&self.ledgers).values().cloned().collect();

        let mut entries: Vec<TransactionEntry> = Vec::new();
        for shared in ledgers {
            let ledger = lock(&shared);
            let enrollment_id = ledger.quote().enrollment_id;
            if wanted(enrollment_id) {
                entries.extend(
                    ledger
                        .payments()
                        .iter()
                        .map(|p| TransactionEntry::from_payment(p, enrollment_id)),
                );
            }
        }

        let store = lock(&self.other_payments);
        entries.extend(
            store
                .records()
                .iter()
                .filter(|r| wanted(r.enrollment_id))
                .map(TransactionEntry::from_other),
        );
        entries
    }

    /// tuition and itemized payments for an enrollment, by date then recording time
    pub fn transactions(&self, enrollment_id: EnrollmentId) -> Vec<TransactionEntry> {
        let mut entries = self.collect_transactions(Some(enrollment_id));
        entries.sort_by(|a, b| (a.date, a.recorded_at).cmp(&(b.date, b.recorded_at)));
        entries
    }

    /// every live payment in the book, newest date first, then invoice number descending
    pub fn all_transactions(&self) -> Vec<TransactionEntry> {
        let mut entries = self.collect_transactions(None);
        entries.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.invoice_number.cmp(&a.invoice_number))
        });
        entries
    }

    /// one row per enrollment's current quote
    ///
    /// Ordered by school year descending, then grade level.
    pub fn tuition_overview(&self) -> Vec<TuitionRow> {
        let current: Vec<QuoteId> = read(&self.enrollments).values().copied().collect();

        let mut rows: Vec<TuitionRow> = current
            .into_iter()
            .filter_map(|id| self.ledger(id).ok())
            .map(|shared| TuitionRow::from_ledger(&lock(&shared)))
            .collect();

        rows.sort_by(|a, b| {
            b.school_year
                .cmp(&a.school_year)
                .then_with(|| a.grade_level.cmp(&b.grade_level))
                .then_with(|| a.enrollment_id.cmp(&b.enrollment_id))
        });
        rows
    }

    pub fn is_invoice_issued(&self, invoice_number: &str) -> bool {
        lock(&self.invoices).is_issued(invoice_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ActivityLog;
    use crate::payments::PaymentComponents;
    use crate::types::{OtherPaymentCategory, PaymentStatus};
    use chrono::{Duration, NaiveDate, TimeZone};
    use hourglass_rs::TimeSource;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
    }

    fn time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(start()))
    }

    fn book() -> (BillingBook, Arc<ActivityLog>) {
        let log = Arc::new(ActivityLog::new());
        (BillingBook::new(log.clone()), log)
    }

    fn scenario_fees() -> FeeStructure {
        FeeStructure::new(
            Money::from_major(3_000),
            Money::from_major(2_600),
            Money::from_major(5_000),
            Money::from_major(500),
            Money::from_major(2_000),
        )
        .unwrap()
    }

    fn flat_fees(monthly: i64) -> FeeStructure {
        FeeStructure::new(Money::ZERO, Money::from_major(monthly), Money::ZERO, Money::ZERO, Money::ZERO).unwrap()
    }

    fn quote(book: &BillingBook, fees: FeeStructure, time: &SafeTimeProvider) -> TuitionQuote {
        let terms = book
            .build_quote(BillingDomain::NewEnrollment, fees, DiscountElection::none(), "2025-2026", "Grade 1")
            .unwrap();
        book.create_quote(Uuid::new_v4(), terms, "registrar", time).unwrap()
    }

    fn tuition(invoice: &str, amount: i64) -> PaymentInput {
        PaymentInput::new(
            invoice,
            PaymentComponents::new(Money::ZERO, Money::from_major(amount), Money::ZERO),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        )
        .recorded_by("cashier")
    }

    #[test]
    fn test_quote_scenarios_through_book() {
        let (book, _) = book();
        let rank_one = DiscountElection::from_flags(true, false, false, false).unwrap();
        let terms = book
            .build_quote(BillingDomain::NewEnrollment, scenario_fees(), rank_one, "2025-2026", "Grade 1")
            .unwrap();
        assert_eq!(terms.grand_total, Money::from_major(34_500));

        let scholar = DiscountElection::from_flags(false, false, false, true).unwrap();
        let breakdown = book
            .compute_discounts(BillingDomain::OldEnrollment, &scenario_fees(), &scholar)
            .unwrap();
        assert_eq!(breakdown.total_discount, Money::from_major(13_000));
    }

    #[test]
    fn test_summary_reflects_payments() {
        let (book, log) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);

        let summary = book.ledger_summary(q.id).unwrap();
        assert_eq!(summary.status, PaymentStatus::Unpaid);
        assert_eq!(summary.remaining_balance, Money::from_major(50_000));

        book.append_payment(q.id, tuition("OR-1", 45_000), &time).unwrap();
        let summary = book.ledger_summary(q.id).unwrap();
        assert_eq!(summary.status, PaymentStatus::Partial);
        assert_eq!(summary.total_paid, Money::from_major(45_000));
        assert_eq!(summary.payments.len(), 1);

        let err = book.append_payment(q.id, tuition("OR-2", 6_000), &time).unwrap_err();
        assert!(matches!(err, LedgerError::OverpaymentRejected { .. }));
        assert_eq!(book.ledger_summary(q.id).unwrap(), summary);

        let actions: Vec<_> = log.entries().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![ActivityAction::QuoteCreated, ActivityAction::PaymentRecorded]);
    }

    #[test]
    fn test_duplicate_invoice_across_unrelated_quotes() {
        let (book, _) = book();
        let time = time();
        let a = quote(&book, flat_fees(5_000), &time);
        let b = quote(&book, flat_fees(3_000), &time);

        book.append_payment(a.id, tuition("OR-0042", 1_000), &time).unwrap();
        let err = book.append_payment(b.id, tuition("OR-0042", 1_000), &time).unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateInvoice {
                invoice_number: "OR-0042".to_string()
            }
        );
        assert_eq!(book.ledger_summary(b.id).unwrap().total_paid, Money::ZERO);
    }

    #[test]
    fn test_invoice_namespace_shared_with_other_payments() {
        let (book, _) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);

        book.append_payment(q.id, tuition("OR-9", 1_000), &time).unwrap();
        let err = book
            .append_other_payment(
                q.enrollment_id,
                vec![OtherPaymentItem::new(OtherPaymentCategory::Carpool, Money::from_major(800))],
                OtherPaymentInput::new("or-9", NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()),
                &time,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateInvoice { .. }));
    }

    #[test]
    fn test_concurrent_appends_never_overdraw() {
        let (book, _) = book();
        let q = quote(&book, flat_fees(5_000), &time());

        let results: Vec<Result<PaymentRecord>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..20)
                .map(|i| {
                    let book = &book;
                    scope.spawn(move || {
                        let time = SafeTimeProvider::new(TimeSource::Test(start()));
                        book.append_payment(q.id, tuition(&format!("OR-{:03}", i), 5_000), &time)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::OverpaymentRejected { .. })))
            .count();
        assert_eq!(accepted, 10);
        assert_eq!(rejected, 10);

        let summary = book.ledger_summary(q.id).unwrap();
        assert_eq!(summary.total_paid, Money::from_major(50_000));
        assert_eq!(summary.status, PaymentStatus::Paid);
    }

    #[test]
    fn test_optimistic_append_detects_stale_version() {
        let (book, _) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);

        let seen = book.ledger_summary(q.id).unwrap().version;
        book.append_payment(q.id, tuition("OR-1", 1_000), &time).unwrap();

        let err = book
            .append_payment_expecting(q.id, tuition("OR-2", 1_000), seen, &time)
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!book.is_invoice_issued("OR-2"));

        let fresh = book.ledger_summary(q.id).unwrap().version;
        book.append_payment_expecting(q.id, tuition("OR-2", 1_000), fresh, &time).unwrap();
    }

    #[test]
    fn test_edit_and_delete_emit_activity() {
        let (book, log) = book();
        let time = time();
        let control = time.test_control().unwrap();
        let q = quote(&book, flat_fees(5_000), &time);

        let record = book.append_payment(q.id, tuition("OR-1", 10_000), &time).unwrap();
        control.advance(Duration::hours(2));

        let edit = PaymentEdit {
            reservation_fee: Some(Money::from_major(2_000)),
            ..Default::default()
        };
        let edited = book.edit_payment(record.id, edit, "reservation was included", "registrar", &time).unwrap();
        assert_eq!(edited.amount(), Money::from_major(12_000));

        assert!(book.soft_delete_payment(record.id, "", "registrar", &time).is_err());
        control.advance(Duration::hours(2));
        book.soft_delete_payment(record.id, "student withdrew", "registrar", &time).unwrap();

        let summary = book.ledger_summary(q.id).unwrap();
        assert_eq!(summary.status, PaymentStatus::Unpaid);
        assert!(summary.payments.is_empty());

        let entries = log.entries_for(record.id);
        let actions: Vec<_> = entries.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                ActivityAction::PaymentRecorded,
                ActivityAction::PaymentEdited,
                ActivityAction::PaymentDeleted
            ]
        );
        assert!(entries[2].details.contains("student withdrew"));
        assert_eq!(entries[2].user, "registrar");

        // the history survives the delete
        let before_delete = book.ledger_snapshot_as_of(q.id, start() + Duration::hours(3)).unwrap();
        assert_eq!(before_delete.total_paid, Money::from_major(12_000));
        let before_edit = book.ledger_snapshot_as_of(q.id, start() + Duration::hours(1)).unwrap();
        assert_eq!(before_edit.total_paid, Money::from_major(10_000));
    }

    #[test]
    fn test_supersede_only_before_payments() {
        let (book, log) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);

        let corrected = book
            .build_quote(BillingDomain::NewEnrollment, flat_fees(4_800), DiscountElection::none(), "2025-2026", "Grade 1")
            .unwrap();
        let replacement = book.supersede_quote(q.id, corrected.clone(), "registrar", &time).unwrap();
        assert_eq!(replacement.supersedes, Some(q.id));
        assert_eq!(book.current_quote(q.enrollment_id).unwrap().id, replacement.id);
        assert!(matches!(
            book.append_payment(q.id, tuition("OR-1", 100), &time),
            Err(LedgerError::QuoteSuperseded { .. })
        ));

        book.append_payment(replacement.id, tuition("OR-2", 100), &time).unwrap();
        assert!(matches!(
            book.supersede_quote(replacement.id, corrected, "registrar", &time),
            Err(LedgerError::QuoteFrozen { .. })
        ));
        assert_eq!(log.entries_for(q.id)[1].action, ActivityAction::QuoteSuperseded);
    }

    #[test]
    fn test_revise_frozen_quote_is_audited() {
        let (book, log) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);
        book.append_payment(q.id, tuition("OR-1", 20_000), &time).unwrap();

        let corrected = book
            .build_quote(BillingDomain::NewEnrollment, flat_fees(4_500), DiscountElection::none(), "2025-2026", "Grade 1")
            .unwrap();
        assert!(book.revise_frozen_quote(q.id, corrected.clone(), " ", "principal", &time).is_err());

        let revised = book
            .revise_frozen_quote(q.id, corrected, "board-approved tuition", "principal", &time)
            .unwrap();
        assert_eq!(revised.id, q.id);
        assert_eq!(revised.grand_total(), Money::from_major(45_000));
        assert_eq!(book.ledger_summary(q.id).unwrap().remaining_balance, Money::from_major(25_000));

        let last = log.entries_for(q.id).pop().unwrap();
        assert_eq!(last.action, ActivityAction::QuoteRevised);
        assert!(last.details.contains("board-approved tuition"));
    }

    #[test]
    fn test_enrollment_gets_one_quote() {
        let (book, _) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);
        let terms = q.terms.clone();
        assert!(matches!(
            book.create_quote(q.enrollment_id, terms, "registrar", &time),
            Err(LedgerError::Validation { .. })
        ));
    }

    #[test]
    fn test_transactions_merge_both_ledgers() {
        let (book, _) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);

        let mut later = tuition("OR-2", 3_000);
        later.date = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        book.append_payment(q.id, later, &time).unwrap();
        book.append_payment(q.id, tuition("OR-1", 5_000), &time).unwrap();
        book.append_other_payment(
            q.enrollment_id,
            vec![
                OtherPaymentItem::new(OtherPaymentCategory::Books, Money::from_major(1_200)),
                OtherPaymentItem::new(OtherPaymentCategory::Pta, Money::from_major(500)),
            ],
            OtherPaymentInput::new("AR-1", NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
            &time,
        )
        .unwrap();

        let list = book.transactions(q.enrollment_id);
        let invoices: Vec<_> = list.iter().map(|t| t.invoice_number.as_str()).collect();
        assert_eq!(invoices, vec!["OR-1", "AR-1", "OR-2"]);
        assert_eq!(list[1].amount, Money::from_major(1_700));

        // itemized payments never touch the tuition balance
        assert_eq!(book.ledger_summary(q.id).unwrap().total_paid, Money::from_major(8_000));
        assert_eq!(book.other_payments_total(q.enrollment_id), Money::from_major(1_700));
    }

    #[test]
    fn test_all_transactions_newest_first() {
        let (book, _) = book();
        let time = time();
        let a = quote(&book, flat_fees(5_000), &time);
        let b = quote(&book, flat_fees(3_000), &time);

        book.append_payment(a.id, tuition("OR-1", 1_000), &time).unwrap();
        book.append_payment(b.id, tuition("OR-2", 1_000), &time).unwrap();
        book.append_other_payment(
            b.enrollment_id,
            vec![OtherPaymentItem::new(OtherPaymentCategory::Uniform, Money::from_major(600))],
            OtherPaymentInput::new("AR-1", NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
            &time,
        )
        .unwrap();

        let list = book.all_transactions();
        let invoices: Vec<_> = list.iter().map(|t| t.invoice_number.as_str()).collect();
        assert_eq!(invoices, vec!["AR-1", "OR-2", "OR-1"]);
        assert_eq!(list[0].enrollment_id, b.enrollment_id);
        assert_eq!(list[2].enrollment_id, a.enrollment_id);
    }

    #[test]
    fn test_tuition_overview_lists_current_quotes() {
        let (book, _) = book();
        let time = time();
        let first = quote(&book, flat_fees(5_000), &time);

        let later_year = book
            .build_quote(
                BillingDomain::OldEnrollment,
                flat_fees(5_500),
                DiscountElection::none().with_exclusive(Some(crate::pricing::ExclusiveDiscount::Sibling)),
                "2026-2027",
                "Grade 2",
            )
            .unwrap();
        let renewal = book.create_quote(Uuid::new_v4(), later_year, "registrar", &time).unwrap();
        book.append_payment(renewal.id, tuition("OR-1", 10_000), &time).unwrap();

        let corrected = book
            .build_quote(BillingDomain::NewEnrollment, flat_fees(4_800), DiscountElection::none(), "2025-2026", "Grade 1")
            .unwrap();
        let replacement = book.supersede_quote(first.id, corrected, "registrar", &time).unwrap();

        let rows = book.tuition_overview();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].quote_id, renewal.id);
        assert_eq!(rows[0].discount_types, vec![crate::types::DiscountTag::Sibling]);
        assert_eq!(rows[0].status, PaymentStatus::Partial);
        assert_eq!(rows[1].quote_id, replacement.id);
        assert_eq!(rows[1].grand_total, Money::from_major(48_000));
        assert_eq!(rows[1].status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_other_payment_requires_known_enrollment() {
        let (book, _) = book();
        let err = book
            .append_other_payment(
                Uuid::new_v4(),
                vec![OtherPaymentItem::new(OtherPaymentCategory::Miscellaneous, Money::from_major(50))],
                OtherPaymentInput::new("AR-2", NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
                &time(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::EnrollmentNotFound { .. }));
    }

    #[test]
    fn test_overflowing_payment_rejected_through_book() {
        let (book, log) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);

        let input = PaymentInput::new(
            "OR-1",
            PaymentComponents::new(Money::from_minor(i64::MAX), Money::CENTAVO, Money::ZERO),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        );
        let err = book.append_payment(q.id, input, &time).unwrap_err();
        assert!(matches!(err, LedgerError::CalculationError { .. }));

        let summary = book.ledger_summary(q.id).unwrap();
        assert_eq!(summary.total_paid, Money::ZERO);
        assert_eq!(summary.remaining_balance, Money::from_major(50_000));
        assert!(!book.is_invoice_issued("OR-1"));
        assert_eq!(log.entries().len(), 1);

        assert!(matches!(
            book.build_quote(
                BillingDomain::NewEnrollment,
                flat_fees(i64::MAX / 500),
                DiscountElection::none(),
                "2025-2026",
                "Grade 1"
            ),
            Err(LedgerError::CalculationError { .. })
        ));
    }

    #[test]
    fn test_revise_requires_frozen_quote() {
        let (book, log) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);

        let corrected = book
            .build_quote(BillingDomain::NewEnrollment, flat_fees(4_500), DiscountElection::none(), "2025-2026", "Grade 1")
            .unwrap();
        let err = book
            .revise_frozen_quote(q.id, corrected, "board-approved tuition", "principal", &time)
            .unwrap_err();
        assert_eq!(err, LedgerError::QuoteNotFrozen { id: q.id });
        assert_eq!(book.quote(q.id).unwrap().grand_total(), Money::from_major(50_000));
        assert_eq!(book.quote(q.id).unwrap().revision, 1);
        assert!(log
            .entries_for(q.id)
            .iter()
            .all(|e| e.action != ActivityAction::QuoteRevised));
    }

    #[test]
    fn test_deleted_payment_can_be_restored() {
        let (book, log) = book();
        let time = time();
        let control = time.test_control().unwrap();
        let q = quote(&book, flat_fees(5_000), &time);

        let record = book.append_payment(q.id, tuition("OR-1", 10_000), &time).unwrap();
        control.advance(Duration::hours(1));
        book.soft_delete_payment(record.id, "entered twice", "registrar", &time).unwrap();

        let deleted = book.deleted_payments();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].record.id, record.id);
        assert_eq!(deleted[0].remarks, "entered twice");

        control.advance(Duration::hours(1));
        let restored = book.restore_payment(record.id, "only entered once", "principal", &time).unwrap();
        assert_eq!(restored.invoice_number, "OR-1");
        assert_eq!(restored.revision, 2);
        assert!(book.deleted_payments().is_empty());

        let summary = book.ledger_summary(q.id).unwrap();
        assert_eq!(summary.total_paid, Money::from_major(10_000));
        assert_eq!(summary.status, PaymentStatus::Partial);

        // the invoice still belongs to the restored payment
        assert!(matches!(
            book.append_payment(q.id, tuition("or-1", 100), &time),
            Err(LedgerError::DuplicateInvoice { .. })
        ));

        let last = log.entries_for(record.id).pop().unwrap();
        assert_eq!(last.action, ActivityAction::PaymentRestored);
        assert_eq!(last.user, "principal");
        assert!(last.details.contains("only entered once"));

        assert!(matches!(
            book.restore_payment(Uuid::new_v4(), "unknown", "principal", &time),
            Err(LedgerError::PaymentNotFound { .. })
        ));
    }

    #[test]
    fn test_restore_rejected_when_balance_is_gone() {
        let (book, _) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);

        let record = book.append_payment(q.id, tuition("OR-1", 30_000), &time).unwrap();
        book.soft_delete_payment(record.id, "wrong quote", "registrar", &time).unwrap();
        book.append_payment(q.id, tuition("OR-2", 50_000), &time).unwrap();

        assert!(matches!(
            book.restore_payment(record.id, "right quote after all", "registrar", &time),
            Err(LedgerError::OverpaymentRejected { .. })
        ));
        assert_eq!(book.deleted_payments().len(), 1);
        assert_eq!(book.ledger_summary(q.id).unwrap().total_paid, Money::from_major(50_000));
    }

    #[test]
    fn test_edit_other_payment_is_audited() {
        let (book, log) = book();
        let time = time();
        let q = quote(&book, flat_fees(5_000), &time);
        book.append_payment(q.id, tuition("OR-1", 1_000), &time).unwrap();

        let record = book
            .append_other_payment(
                q.enrollment_id,
                vec![OtherPaymentItem::new(OtherPaymentCategory::Books, Money::from_major(1_200))],
                OtherPaymentInput::new("AR-1", NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()).recorded_by("cashier"),
                &time,
            )
            .unwrap();

        let taken = OtherPaymentEdit {
            invoice_number: Some("OR-1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            book.edit_other_payment(record.id, taken, "renumbered", "registrar", &time),
            Err(LedgerError::DuplicateInvoice { .. })
        ));

        let edit = OtherPaymentEdit {
            items: Some(vec![OtherPaymentItem::new(OtherPaymentCategory::Books, Money::from_major(900))]),
            ..Default::default()
        };
        let edited = book
            .edit_other_payment(record.id, edit, "one workbook returned", "registrar", &time)
            .unwrap();
        assert_eq!(edited.revision, 2);
        assert_eq!(book.other_payments_total(q.enrollment_id), Money::from_major(900));

        let last = log.entries_for(record.id).pop().unwrap();
        assert_eq!(last.action, ActivityAction::OtherPaymentEdited);
        assert!(last.details.contains("1200.00 -> 900.00"));

        assert!(matches!(
            book.edit_other_payment(Uuid::new_v4(), OtherPaymentEdit::default(), "x", "registrar", &time),
            Err(LedgerError::OtherPaymentNotFound { .. })
        ));
    }
}
