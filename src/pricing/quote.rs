use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{BillingDomain, EnrollmentId, QuoteId};

use super::discount::{DiscountBreakdown, DiscountElection, DiscountPolicy};
use super::fees::FeeStructure;

/// computed billing terms, independent of any identity
///
/// Two builds from the same inputs compare (and serialize) equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTerms {
    pub billing_domain: BillingDomain,
    pub fee_structure: FeeStructure,
    pub discount_election: DiscountElection,
    pub discount_breakdown: DiscountBreakdown,
    pub total_tuition_fee: Money,
    pub grand_total: Money,
    pub school_year: String,
    pub grade_level: String,
}

impl QuoteTerms {
    /// compute terms under a configuration
    pub fn compute(
        config: &BillingConfig,
        fees: FeeStructure,
        election: DiscountElection,
        school_year: &str,
        grade_level: &str,
    ) -> Result<Self> {
        let school_year = school_year.trim();
        let grade_level = grade_level.trim();
        if school_year.is_empty() {
            return Err(LedgerError::validation("school_year is required"));
        }
        if grade_level.is_empty() {
            return Err(LedgerError::validation("grade_level is required"));
        }

        let policy = DiscountPolicy::new(config);
        let discount_breakdown = policy.compute(&fees, &election)?;
        let total_tuition_fee = fees.total_tuition_fee(policy.tuition_months())?;

        let gross = Money::try_sum([fees.fixed_fees()?, total_tuition_fee])?;
        // both sides are non-negative, so this can't overflow
        let net = gross - discount_breakdown.total_discount;
        let grand_total = if net.is_negative() {
            warn!(
                gross = %gross,
                total_discount = %discount_breakdown.total_discount,
                "discounts exceed base fees, clamping grand total to zero"
            );
            Money::ZERO
        } else {
            net
        };

        Ok(Self {
            billing_domain: config.domain,
            fee_structure: fees,
            discount_election: election,
            discount_breakdown,
            total_tuition_fee,
            grand_total,
            school_year: school_year.to_string(),
            grade_level: grade_level.to_string(),
        })
    }

    pub fn total_discount(&self) -> Money {
        self.discount_breakdown.total_discount
    }
}

/// a billing baseline registered against an enrollment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuitionQuote {
    pub id: QuoteId,
    pub enrollment_id: EnrollmentId,
    /// the quote this one replaced, if any
    pub supersedes: Option<QuoteId>,
    /// 1 on creation, bumped by each audited revision
    pub revision: u32,
    pub terms: QuoteTerms,
}

impl TuitionQuote {
    pub fn new(id: QuoteId, enrollment_id: EnrollmentId, terms: QuoteTerms) -> Self {
        Self {
            id,
            enrollment_id,
            supersedes: None,
            revision: 1,
            terms,
        }
    }

    pub fn grand_total(&self) -> Money {
        self.terms.grand_total
    }

    pub fn total_tuition_fee(&self) -> Money {
        self.terms.total_tuition_fee
    }

    pub fn total_discount(&self) -> Money {
        self.terms.total_discount()
    }

    /// true when the computed figures match, ignoring identity
    pub fn computed_eq(&self, other: &TuitionQuote) -> bool {
        self.terms == other.terms
    }
}

/// builder for quote terms
pub struct QuoteBuilder {
    config: BillingConfig,
    fees: Option<FeeStructure>,
    election: DiscountElection,
    school_year: Option<String>,
    grade_level: Option<String>,
}

impl QuoteBuilder {
    pub fn new() -> Self {
        Self {
            config: BillingConfig::default(),
            fees: None,
            election: DiscountElection::none(),
            school_year: None,
            grade_level: None,
        }
    }

    pub fn domain(mut self, domain: BillingDomain) -> Self {
        self.config = BillingConfig::for_domain(domain);
        self
    }

    pub fn config(mut self, config: BillingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fees(mut self, fees: FeeStructure) -> Self {
        self.fees = Some(fees);
        self
    }

    pub fn election(mut self, election: DiscountElection) -> Self {
        self.election = election;
        self
    }

    pub fn school_year(mut self, school_year: impl Into<String>) -> Self {
        self.school_year = Some(school_year.into());
        self
    }

    pub fn grade_level(mut self, grade_level: impl Into<String>) -> Self {
        self.grade_level = Some(grade_level.into());
        self
    }

    pub fn build(self) -> Result<QuoteTerms> {
        self.config.validate()?;
        let fees = self
            .fees
            .ok_or_else(|| LedgerError::validation("fee structure is required"))?;

        QuoteTerms::compute(
            &self.config,
            fees,
            self.election,
            self.school_year.as_deref().unwrap_or_default(),
            self.grade_level.as_deref().unwrap_or_default(),
        )
    }
}

impl Default for QuoteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// build quote terms under the default (new enrollment) configuration
pub fn build_quote(
    fees: FeeStructure,
    election: DiscountElection,
    school_year: &str,
    grade_level: &str,
) -> Result<QuoteTerms> {
    QuoteTerms::compute(&BillingConfig::default(), fees, election, school_year, grade_level)
}
