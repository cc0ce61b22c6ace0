/// config from json - override one domain's discount rates
use std::sync::Arc;

use tuition_ledger_rs::{
    ActivityLog, BillingBook, BillingConfig, BillingDomain, DiscountElection, ExclusiveDiscount,
    FeeStructure, Money,
};

const OLD_ENROLLMENT: &str = r#"{
    "domain": "old_enrollment",
    "tuition_months": 10,
    "discount_rates": {
        "sibling_rate": "0.10",
        "scholar_rate": "0.75",
        "whole_year_months_waived": 1
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuition_ledger_rs=debug".into()),
        )
        .init();

    let config = BillingConfig::from_json(OLD_ENROLLMENT)?;
    let book = BillingBook::new(Arc::new(ActivityLog::new())).with_config(config)?;

    let fees = FeeStructure::new(
        Money::from_major(3_000),
        Money::from_major(2_600),
        Money::from_major(5_000),
        Money::from_major(500),
        Money::from_major(2_000),
    )?;
    let election = DiscountElection::none().with_exclusive(Some(ExclusiveDiscount::Scholar));

    for domain in [BillingDomain::NewEnrollment, BillingDomain::OldEnrollment] {
        let breakdown = book.compute_discounts(domain, &fees, &election)?;
        println!("{:?}: {} ({})", domain, breakdown.total_discount, breakdown.label_text());
    }

    // bad rates are refused at load time
    let broken = OLD_ENROLLMENT.replace("\"0.75\"", "\"1.5\"");
    if let Err(e) = BillingConfig::from_json(&broken) {
        println!("rejected config: {}", e);
    }

    Ok(())
}
