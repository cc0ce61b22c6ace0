/// quick start - price an enrollment and record one payment
use std::sync::Arc;

use chrono::NaiveDate;
use tuition_ledger_rs::{
    BillingBook, BillingDomain, DiscountElection, FeeStructure, Money, PaymentComponents,
    PaymentInput, SafeTimeProvider, TimeSource, TracingSink, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuition_ledger_rs=info,activity=info".into()),
        )
        .init();

    let time = SafeTimeProvider::new(TimeSource::System);
    let book = BillingBook::new(Arc::new(TracingSink));

    let fees = FeeStructure::builder()
        .enrollment_fee(Money::from_major(3_000))
        .monthly_tuition(Money::from_major(2_600))
        .misc_fee(Money::from_major(5_000))
        .pta_fee(Money::from_major(500))
        .lms_books_fee(Money::from_major(2_000))
        .build()?;

    // top of the class: lms/books fee waived
    let election = DiscountElection::from_flags(true, false, false, false)?;
    let terms = book.build_quote(BillingDomain::NewEnrollment, fees, election, "2025-2026", "Grade 1")?;
    let quote = book.create_quote(Uuid::new_v4(), terms, "registrar", &time)?;

    let payment = PaymentInput::new(
        "OR-0001",
        PaymentComponents::new(Money::from_major(1_000), Money::from_major(9_000), Money::ZERO),
        NaiveDate::from_ymd_opt(2025, 6, 2).ok_or("bad date")?,
    )
    .recorded_by("cashier");
    book.append_payment(quote.id, payment, &time)?;

    println!("{}", book.ledger_summary(quote.id)?.to_json_pretty()?);

    Ok(())
}
