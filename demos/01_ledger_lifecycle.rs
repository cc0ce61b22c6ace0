/// ledger lifecycle - payments, a rejected overpayment, an edit, a delete,
/// and a look back in time using a controlled clock
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tuition_ledger_rs::{
    ActivityLog, BillingBook, BillingDomain, DiscountElection, ExclusiveDiscount, FeeStructure,
    LedgerError, Money, OtherPaymentCategory, OtherPaymentInput, OtherPaymentItem,
    PaymentComponents, PaymentEdit, PaymentInput, QuoteView, SafeTimeProvider, TimeSource, Uuid,
};

fn tuition(invoice: &str, amount: i64, date: NaiveDate) -> PaymentInput {
    PaymentInput::new(
        invoice,
        PaymentComponents::new(Money::ZERO, Money::from_major(amount), Money::ZERO),
        date,
    )
    .recorded_by("cashier")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuition_ledger_rs=debug".into()),
        )
        .init();

    let start = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
    let time = SafeTimeProvider::new(TimeSource::Test(start));
    let control = time.test_control().unwrap();

    let log = Arc::new(ActivityLog::new());
    let book = BillingBook::new(log.clone());

    let fees = FeeStructure::new(
        Money::from_major(3_000),
        Money::from_major(2_600),
        Money::from_major(5_000),
        Money::from_major(500),
        Money::from_major(2_000),
    )?;
    let election = DiscountElection::none().with_exclusive(Some(ExclusiveDiscount::Sibling));
    let terms = book.build_quote(BillingDomain::OldEnrollment, fees, election, "2025-2026", "Grade 5")?;

    let enrollment = Uuid::new_v4();
    let quote = book.create_quote(enrollment, terms, "registrar", &time)?;
    println!("{}", QuoteView::from_quote(&quote).to_json_pretty()?);

    let june = NaiveDate::from_ymd_opt(2025, 6, 2).ok_or("bad date")?;
    let first = book.append_payment(quote.id, tuition("OR-100", 20_000, june), &time)?;
    control.advance(Duration::days(30));
    book.append_payment(quote.id, tuition("OR-101", 10_000, june + Duration::days(30)), &time)?;

    match book.append_payment(quote.id, tuition("OR-102", 50_000, june + Duration::days(30)), &time) {
        Err(LedgerError::OverpaymentRejected { remaining, requested }) => {
            println!("rejected {} against a balance of {}", requested, remaining)
        }
        other => println!("unexpected: {:?}", other),
    }

    control.advance(Duration::days(1));
    let edit = PaymentEdit {
        reservation_fee: Some(Money::from_major(2_000)),
        ..Default::default()
    };
    book.edit_payment(first.id, edit, "reservation fee was part of this receipt", "registrar", &time)?;

    book.append_other_payment(
        enrollment,
        vec![
            OtherPaymentItem::new(OtherPaymentCategory::Carpool, Money::from_major(1_500)),
            OtherPaymentItem::new(OtherPaymentCategory::Uniform, Money::from_major(750)),
        ],
        OtherPaymentInput::new("AR-200", june + Duration::days(31)).recorded_by("cashier"),
        &time,
    )?;

    let before_delete = time.now();
    control.advance(Duration::days(1));
    book.soft_delete_payment(first.id, "check bounced", "registrar", &time)?;

    println!("{}", book.ledger_summary(quote.id)?.to_json_pretty()?);
    println!("before delete: {:?}", book.ledger_snapshot_as_of(quote.id, before_delete)?);

    for entry in book.transactions(enrollment) {
        println!("{} {:<8} {:>10} {}", entry.date, entry.invoice_number, entry.amount, entry.description);
    }
    for entry in log.entries() {
        println!("[{}] {:?} by {}: {}", entry.timestamp, entry.action, entry.user, entry.details);
    }

    Ok(())
}
