use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{LedgerError, Result};
use crate::types::BillingDomain;

/// billing configuration for one billing domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    pub domain: BillingDomain,
    /// months of tuition billed per school year
    pub tuition_months: u32,
    pub discount_rates: DiscountRates,
}

/// discount parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRates {
    /// share of total tuition waived for siblings
    pub sibling_rate: Rate,
    /// share of total tuition waived for scholars
    pub scholar_rate: Rate,
    /// months of tuition waived when the whole year is paid up front
    pub whole_year_months_waived: u32,
}

impl DiscountRates {
    fn standard() -> Self {
        Self {
            sibling_rate: Rate::from_decimal(dec!(0.05)),
            scholar_rate: Rate::from_decimal(dec!(0.50)),
            whole_year_months_waived: 1,
        }
    }
}

impl BillingConfig {
    /// create configuration for first-time enrollments
    pub fn new_enrollment() -> Self {
        Self {
            domain: BillingDomain::NewEnrollment,
            tuition_months: 10,
            discount_rates: DiscountRates::standard(),
        }
    }

    /// create configuration for renewing students
    pub fn old_enrollment() -> Self {
        Self {
            domain: BillingDomain::OldEnrollment,
            tuition_months: 10,
            discount_rates: DiscountRates::standard(),
        }
    }

    pub fn for_domain(domain: BillingDomain) -> Self {
        match domain {
            BillingDomain::NewEnrollment => Self::new_enrollment(),
            BillingDomain::OldEnrollment => Self::old_enrollment(),
        }
    }

    /// load and validate from a json document
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: BillingConfig = serde_json::from_str(raw).map_err(|e| LedgerError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tuition_months == 0 {
            return Err(LedgerError::Config {
                message: "tuition_months must be at least 1".to_string(),
            });
        }

        let rates = &self.discount_rates;
        for (name, rate) in [("sibling_rate", rates.sibling_rate), ("scholar_rate", rates.scholar_rate)] {
            if !rate.is_fraction() {
                return Err(LedgerError::Config {
                    message: format!("{} must be between 0% and 100%, got {}", name, rate),
                });
            }
        }

        if rates.whole_year_months_waived > self.tuition_months {
            return Err(LedgerError::Config {
                message: format!(
                    "whole_year_months_waived ({}) exceeds tuition_months ({})",
                    rates.whole_year_months_waived, self.tuition_months
                ),
            });
        }

        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self::new_enrollment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(BillingConfig::new_enrollment().validate().is_ok());
        assert!(BillingConfig::old_enrollment().validate().is_ok());
        assert_eq!(
            BillingConfig::for_domain(BillingDomain::OldEnrollment).domain,
            BillingDomain::OldEnrollment
        );
    }

    #[test]
    fn test_rejects_rate_above_one() {
        let mut config = BillingConfig::new_enrollment();
        config.discount_rates.scholar_rate = Rate::from_percentage(120);
        assert!(matches!(config.validate(), Err(LedgerError::Config { .. })));
    }

    #[test]
    fn test_rejects_waiver_longer_than_year() {
        let mut config = BillingConfig::new_enrollment();
        config.discount_rates.whole_year_months_waived = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_with_validation() {
        let json = serde_json::to_string(&BillingConfig::old_enrollment()).unwrap();
        let loaded = BillingConfig::from_json(&json).unwrap();
        assert_eq!(loaded, BillingConfig::old_enrollment());

        let bad = json.replace("\"tuition_months\":10", "\"tuition_months\":0");
        assert!(BillingConfig::from_json(&bad).is_err());
    }
}
