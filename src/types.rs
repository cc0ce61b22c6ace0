use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a tuition quote
pub type QuoteId = Uuid;

/// unique identifier for a tuition payment record
pub type PaymentId = Uuid;

/// unique identifier for an itemized (other) payment record
pub type OtherPaymentId = Uuid;

/// enrollment the billing belongs to
pub type EnrollmentId = Uuid;

/// which fee structure an enrollment is billed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingDomain {
    /// first-time enrollment
    NewEnrollment,
    /// existing student renewing for another school year
    OldEnrollment,
}

/// payment status, always derived from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// nothing paid yet
    Unpaid,
    /// some paid, balance remaining
    Partial,
    /// balance is zero
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Paid => "Paid",
        };
        f.write_str(label)
    }
}

/// how a payment was tendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Check,
    EWallet,
    Card,
    Other(String),
}

/// discount tags, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiscountTag {
    #[serde(rename = "rank_1")]
    RankOne,
    #[serde(rename = "sibling")]
    Sibling,
    #[serde(rename = "full_year")]
    FullYear,
    #[serde(rename = "scholar")]
    Scholar,
}

impl DiscountTag {
    pub fn label(&self) -> &'static str {
        match self {
            DiscountTag::RankOne => "rank_1",
            DiscountTag::Sibling => "sibling",
            DiscountTag::FullYear => "full_year",
            DiscountTag::Scholar => "scholar",
        }
    }
}

impl fmt::Display for DiscountTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// category of an itemized non-tuition payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtherPaymentCategory {
    Books,
    Pta,
    Carpool,
    Uniform,
    Miscellaneous,
    Other(String),
}

/// why a record left the live ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveReason {
    /// replaced by a newer revision
    Edited,
    /// soft-deleted
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_tag_order_and_labels() {
        let mut tags = vec![DiscountTag::Scholar, DiscountTag::RankOne, DiscountTag::FullYear, DiscountTag::Sibling];
        tags.sort();
        let labels: Vec<_> = tags.iter().map(|t| t.label()).collect();
        assert_eq!(labels, vec!["rank_1", "sibling", "full_year", "scholar"]);
        assert_eq!(serde_json::to_string(&DiscountTag::RankOne).unwrap(), "\"rank_1\"");
    }
}
