pub mod book;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod payments;
pub mod pricing;
pub mod serialization;
pub mod types;

// re-export key types
pub use book::BillingBook;
pub use config::{BillingConfig, DiscountRates};
pub use decimal::{Money, Rate};
pub use errors::{LedgerError, Result};
pub use events::{ActivityAction, ActivityEntry, ActivityLog, ActivitySink, EntityType, TracingSink};
pub use payments::{
    derive_status, ArchivedOtherPayment, ArchivedPayment, LedgerSnapshot, OtherPaymentEdit,
    OtherPaymentInput, OtherPaymentItem, OtherPaymentRecord, PaymentComponents, PaymentEdit,
    PaymentInput, PaymentLedger, PaymentRecord,
};
pub use pricing::{
    build_quote, compute_discounts, DiscountBreakdown, DiscountElection, DiscountPolicy,
    ExclusiveDiscount, FeeStructure, FeeStructureBuilder, QuoteBuilder, QuoteTerms, TuitionQuote,
};
pub use serialization::{LedgerSummary, QuoteView, TransactionEntry, TransactionKind, TuitionRow};
pub use types::{
    ArchiveReason, BillingDomain, DiscountTag, EnrollmentId, OtherPaymentCategory, OtherPaymentId,
    PaymentId, PaymentMethod, PaymentStatus, QuoteId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
