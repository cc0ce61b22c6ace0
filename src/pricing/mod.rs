pub mod discount;
pub mod fees;
pub mod quote;

pub use discount::{
    compute_discounts, DiscountBreakdown, DiscountElection, DiscountPolicy, ExclusiveDiscount,
};
pub use fees::{FeeStructure, FeeStructureBuilder};
pub use quote::{build_quote, QuoteBuilder, QuoteTerms, TuitionQuote};
