use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BillingConfig, DiscountRates};
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::DiscountTag;

use super::fees::FeeStructure;

/// the mutually exclusive discount group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusiveDiscount {
    Sibling,
    WholeYear,
    Scholar,
}

/// elected discounts
///
/// Holds at most one member of the exclusive group. Setting a member
/// replaces whatever was elected before in a single assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DiscountElection {
    rank_one: bool,
    exclusive: Option<ExclusiveDiscount>,
}

impl DiscountElection {
    pub fn none() -> Self {
        Self::default()
    }

    /// build from the four form flags, failing if two exclusive flags are set
    pub fn from_flags(
        is_rank_one: bool,
        has_sibling_discount: bool,
        has_whole_year_discount: bool,
        has_scholar_discount: bool,
    ) -> Result<Self> {
        let selected: Vec<ExclusiveDiscount> = [
            (has_sibling_discount, ExclusiveDiscount::Sibling),
            (has_whole_year_discount, ExclusiveDiscount::WholeYear),
            (has_scholar_discount, ExclusiveDiscount::Scholar),
        ]
        .into_iter()
        .filter_map(|(set, discount)| set.then_some(discount))
        .collect();

        if selected.len() > 1 {
            return Err(LedgerError::InvariantViolation {
                message: format!(
                    "sibling, whole-year and scholar discounts are mutually exclusive, got {:?}",
                    selected
                ),
            });
        }

        Ok(Self {
            rank_one: is_rank_one,
            exclusive: selected.first().copied(),
        })
    }

    pub fn with_rank_one(mut self, on: bool) -> Self {
        self.rank_one = on;
        self
    }

    pub fn with_exclusive(mut self, discount: Option<ExclusiveDiscount>) -> Self {
        self.exclusive = discount;
        self
    }

    pub fn set_rank_one(&mut self, on: bool) {
        self.rank_one = on;
    }

    /// elect or clear one of the exclusive group
    ///
    /// Turning a member on clears the other two. Turning a member off only
    /// clears it if it is the one currently elected.
    pub fn set_exclusive(&mut self, discount: ExclusiveDiscount, on: bool) {
        if on {
            self.exclusive = Some(discount);
        } else if self.exclusive == Some(discount) {
            self.exclusive = None;
        }
    }

    pub fn set_sibling_discount(&mut self, on: bool) {
        self.set_exclusive(ExclusiveDiscount::Sibling, on);
    }

    pub fn set_whole_year_discount(&mut self, on: bool) {
        self.set_exclusive(ExclusiveDiscount::WholeYear, on);
    }

    pub fn set_scholar_discount(&mut self, on: bool) {
        self.set_exclusive(ExclusiveDiscount::Scholar, on);
    }

    pub fn is_rank_one(&self) -> bool {
        self.rank_one
    }

    pub fn has_sibling_discount(&self) -> bool {
        self.exclusive == Some(ExclusiveDiscount::Sibling)
    }

    pub fn has_whole_year_discount(&self) -> bool {
        self.exclusive == Some(ExclusiveDiscount::WholeYear)
    }

    pub fn has_scholar_discount(&self) -> bool {
        self.exclusive == Some(ExclusiveDiscount::Scholar)
    }

    pub fn exclusive(&self) -> Option<ExclusiveDiscount> {
        self.exclusive
    }
}

/// wire shape of an election, the four flags the admin form submits
#[derive(Serialize, Deserialize)]
struct ElectionFlags {
    is_rank_one: bool,
    has_sibling_discount: bool,
    has_whole_year_discount: bool,
    has_scholar_discount: bool,
}

impl Serialize for DiscountElection {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ElectionFlags {
            is_rank_one: self.is_rank_one(),
            has_sibling_discount: self.has_sibling_discount(),
            has_whole_year_discount: self.has_whole_year_discount(),
            has_scholar_discount: self.has_scholar_discount(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DiscountElection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let flags = ElectionFlags::deserialize(deserializer)?;
        DiscountElection::from_flags(
            flags.is_rank_one,
            flags.has_sibling_discount,
            flags.has_whole_year_discount,
            flags.has_scholar_discount,
        )
        .map_err(serde::de::Error::custom)
    }
}

/// discount amounts derived from fees and an election
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountBreakdown {
    pub rank_one_discount: Money,
    pub sibling_discount: Money,
    pub whole_year_discount: Money,
    pub scholar_discount: Money,
    pub total_discount: Money,
    /// rank_1 -> sibling -> full_year -> scholar, zero amounts skipped
    pub applied_labels: Vec<DiscountTag>,
}

impl DiscountBreakdown {
    pub fn amount_for(&self, tag: DiscountTag) -> Money {
        match tag {
            DiscountTag::RankOne => self.rank_one_discount,
            DiscountTag::Sibling => self.sibling_discount,
            DiscountTag::FullYear => self.whole_year_discount,
            DiscountTag::Scholar => self.scholar_discount,
        }
    }

    /// labels joined for display, e.g. "rank_1, scholar"
    pub fn label_text(&self) -> String {
        self.applied_labels
            .iter()
            .map(|t| t.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The one place discount arithmetic happens.
#[derive(Debug, Clone)]
pub struct DiscountPolicy {
    rates: DiscountRates,
    tuition_months: u32,
}

impl DiscountPolicy {
    pub fn new(config: &BillingConfig) -> Self {
        Self {
            rates: config.discount_rates.clone(),
            tuition_months: config.tuition_months,
        }
    }

    pub fn tuition_months(&self) -> u32 {
        self.tuition_months
    }

    pub fn compute(&self, fees: &FeeStructure, election: &DiscountElection) -> Result<DiscountBreakdown> {
        let total_tuition = fees.total_tuition_fee(self.tuition_months)?;

        let rank_one_discount = if election.is_rank_one() {
            fees.lms_books_fee()
        } else {
            Money::ZERO
        };

        let sibling_discount = if election.has_sibling_discount() {
            total_tuition.apply_rate(self.rates.sibling_rate)?
        } else {
            Money::ZERO
        };

        let whole_year_discount = if election.has_whole_year_discount() {
            fees.monthly_tuition().try_mul(i64::from(self.rates.whole_year_months_waived))?
        } else {
            Money::ZERO
        };

        let scholar_discount = if election.has_scholar_discount() {
            total_tuition.apply_rate(self.rates.scholar_rate)?
        } else {
            Money::ZERO
        };

        let applied_labels = [
            (DiscountTag::RankOne, rank_one_discount),
            (DiscountTag::Sibling, sibling_discount),
            (DiscountTag::FullYear, whole_year_discount),
            (DiscountTag::Scholar, scholar_discount),
        ]
        .into_iter()
        .filter(|(_, amount)| amount.is_positive())
        .map(|(tag, _)| tag)
        .collect();

        let total_discount = Money::try_sum([
            rank_one_discount,
            sibling_discount,
            whole_year_discount,
            scholar_discount,
        ])?;

        let breakdown = DiscountBreakdown {
            rank_one_discount,
            sibling_discount,
            whole_year_discount,
            scholar_discount,
            total_discount,
            applied_labels,
        };

        debug!(
            total_discount = %breakdown.total_discount,
            labels = %breakdown.label_text(),
            "computed discount breakdown"
        );

        Ok(breakdown)
    }
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self::new(&BillingConfig::default())
    }
}

/// compute discounts under the default (new enrollment) configuration
pub fn compute_discounts(fees: &FeeStructure, election: &DiscountElection) -> Result<DiscountBreakdown> {
    DiscountPolicy::default().compute(fees, election)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fees() -> FeeStructure {
        FeeStructure::new(
            Money::from_major(3_000),
            Money::from_major(2_600),
            Money::from_major(5_000),
            Money::from_major(500),
            Money::from_major(2_000),
        )
        .unwrap()
    }

    #[test]
    fn test_rank_one_waives_lms_books() {
        let election = DiscountElection::none().with_rank_one(true);
        let breakdown = compute_discounts(&fees(), &election).unwrap();

        assert_eq!(breakdown.rank_one_discount, Money::from_major(2_000));
        assert_eq!(breakdown.total_discount, Money::from_major(2_000));
        assert_eq!(breakdown.applied_labels, vec![DiscountTag::RankOne]);
    }

    #[test]
    fn test_each_exclusive_discount() {
        let mut election = DiscountElection::none();

        election.set_sibling_discount(true);
        let b = compute_discounts(&fees(), &election).unwrap();
        assert_eq!(b.sibling_discount, Money::from_major(1_300));

        election.set_whole_year_discount(true);
        let b = compute_discounts(&fees(), &election).unwrap();
        assert_eq!(b.whole_year_discount, Money::from_major(2_600));
        assert_eq!(b.sibling_discount, Money::ZERO);

        election.set_scholar_discount(true);
        let b = compute_discounts(&fees(), &election).unwrap();
        assert_eq!(b.scholar_discount, Money::from_major(13_000));
        assert_eq!(b.total_discount, Money::from_major(13_000));
        assert_eq!(b.applied_labels, vec![DiscountTag::Scholar]);
    }

    #[test]
    fn test_setting_scholar_clears_sibling() {
        let mut election = DiscountElection::none();
        election.set_sibling_discount(true);
        election.set_scholar_discount(true);

        assert!(!election.has_sibling_discount());
        assert!(election.has_scholar_discount());
        assert!(!election.has_whole_year_discount());
    }

    #[test]
    fn test_clearing_unelected_member_is_noop() {
        let mut election = DiscountElection::none();
        election.set_scholar_discount(true);
        election.set_sibling_discount(false);
        assert!(election.has_scholar_discount());

        election.set_scholar_discount(false);
        assert_eq!(election.exclusive(), None);
    }

    #[test]
    fn test_rank_one_combines_with_exclusive() {
        let election = DiscountElection::from_flags(true, true, false, false).unwrap();
        let b = compute_discounts(&fees(), &election).unwrap();

        assert_eq!(b.total_discount, Money::from_major(3_300));
        assert_eq!(b.applied_labels, vec![DiscountTag::RankOne, DiscountTag::Sibling]);
        assert_eq!(b.label_text(), "rank_1, sibling");
    }

    #[test]
    fn test_two_exclusive_flags_is_invariant_violation() {
        let result = DiscountElection::from_flags(false, true, false, true);
        assert!(matches!(result, Err(LedgerError::InvariantViolation { .. })));

        let json = r#"{"is_rank_one":false,"has_sibling_discount":false,"has_whole_year_discount":true,"has_scholar_discount":true}"#;
        assert!(serde_json::from_str::<DiscountElection>(json).is_err());
    }

    #[test]
    fn test_zero_amount_labels_skipped() {
        let no_books = FeeStructure::new(
            Money::from_major(3_000),
            Money::from_major(2_600),
            Money::ZERO,
            Money::ZERO,
            Money::ZERO,
        )
        .unwrap();
        let election = DiscountElection::none().with_rank_one(true);
        let b = compute_discounts(&no_books, &election).unwrap();
        assert!(b.applied_labels.is_empty());
    }

    #[test]
    fn test_sibling_rounds_to_nearest_even_centavo() {
        // 10 x 0.33 = 3.30; 5% = 16.5 centavos -> 16
        let odd = FeeStructure::new(Money::ZERO, Money::from_minor(33), Money::ZERO, Money::ZERO, Money::ZERO).unwrap();
        let election = DiscountElection::none().with_exclusive(Some(ExclusiveDiscount::Sibling));
        let b = compute_discounts(&odd, &election).unwrap();
        assert_eq!(b.sibling_discount, Money::from_minor(16));
    }

    #[test]
    fn test_election_serializes_as_flags() {
        let election = DiscountElection::from_flags(true, false, true, false).unwrap();
        let json = serde_json::to_string(&election).unwrap();
        assert_eq!(
            json,
            r#"{"is_rank_one":true,"has_sibling_discount":false,"has_whole_year_discount":true,"has_scholar_discount":false}"#
        );
        let back: DiscountElection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, election);
    }
}
