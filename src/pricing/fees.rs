use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};

/// raw fee inputs for one enrollment period
///
/// Fields are private so an invalid structure can't be built by hand; a
/// correction produces a new structure and a new quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeStructure {
    enrollment_fee: Money,
    monthly_tuition: Money,
    misc_fee: Money,
    pta_fee: Money,
    lms_books_fee: Money,
}

impl FeeStructure {
    pub fn new(
        enrollment_fee: Money,
        monthly_tuition: Money,
        misc_fee: Money,
        pta_fee: Money,
        lms_books_fee: Money,
    ) -> Result<Self> {
        let fees = Self {
            enrollment_fee,
            monthly_tuition,
            misc_fee,
            pta_fee,
            lms_books_fee,
        };
        fees.validate()?;
        Ok(fees)
    }

    pub fn builder() -> FeeStructureBuilder {
        FeeStructureBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        for (name, amount) in self.named_amounts() {
            if amount.is_negative() {
                return Err(LedgerError::validation(format!(
                    "{} must not be negative, got {}",
                    name, amount
                )));
            }
        }
        Ok(())
    }

    fn named_amounts(&self) -> [(&'static str, Money); 5] {
        [
            ("enrollment_fee", self.enrollment_fee),
            ("monthly_tuition", self.monthly_tuition),
            ("misc_fee", self.misc_fee),
            ("pta_fee", self.pta_fee),
            ("lms_books_fee", self.lms_books_fee),
        ]
    }

    pub fn enrollment_fee(&self) -> Money {
        self.enrollment_fee
    }

    pub fn monthly_tuition(&self) -> Money {
        self.monthly_tuition
    }

    pub fn misc_fee(&self) -> Money {
        self.misc_fee
    }

    pub fn pta_fee(&self) -> Money {
        self.pta_fee
    }

    pub fn lms_books_fee(&self) -> Money {
        self.lms_books_fee
    }

    /// monthly tuition over the billed months
    pub fn total_tuition_fee(&self, tuition_months: u32) -> Result<Money> {
        self.monthly_tuition.try_mul(i64::from(tuition_months))
    }

    /// enrollment + misc + pta + lms/books
    pub fn fixed_fees(&self) -> Result<Money> {
        Money::try_sum([self.enrollment_fee, self.misc_fee, self.pta_fee, self.lms_books_fee])
    }
}

// deserialization goes through the validating constructor
impl<'de> Deserialize<'de> for FeeStructure {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            enrollment_fee: Money,
            monthly_tuition: Money,
            misc_fee: Money,
            pta_fee: Money,
            lms_books_fee: Money,
        }

        let raw = Raw::deserialize(deserializer)?;
        FeeStructure::new(
            raw.enrollment_fee,
            raw.monthly_tuition,
            raw.misc_fee,
            raw.pta_fee,
            raw.lms_books_fee,
        )
        .map_err(serde::de::Error::custom)
    }
}

/// builder for fee structures; every field is required
#[derive(Debug, Default)]
pub struct FeeStructureBuilder {
    enrollment_fee: Option<Money>,
    monthly_tuition: Option<Money>,
    misc_fee: Option<Money>,
    pta_fee: Option<Money>,
    lms_books_fee: Option<Money>,
}

impl FeeStructureBuilder {
    pub fn enrollment_fee(mut self, amount: Money) -> Self {
        self.enrollment_fee = Some(amount);
        self
    }

    pub fn monthly_tuition(mut self, amount: Money) -> Self {
        self.monthly_tuition = Some(amount);
        self
    }

    pub fn misc_fee(mut self, amount: Money) -> Self {
        self.misc_fee = Some(amount);
        self
    }

    pub fn pta_fee(mut self, amount: Money) -> Self {
        self.pta_fee = Some(amount);
        self
    }

    pub fn lms_books_fee(mut self, amount: Money) -> Self {
        self.lms_books_fee = Some(amount);
        self
    }

    pub fn build(self) -> Result<FeeStructure> {
        fn required(value: Option<Money>, name: &str) -> Result<Money> {
            value.ok_or_else(|| LedgerError::validation(format!("{} is required", name)))
        }

        FeeStructure::new(
            required(self.enrollment_fee, "enrollment_fee")?,
            required(self.monthly_tuition, "monthly_tuition")?,
            required(self.misc_fee, "misc_fee")?,
            required(self.pta_fee, "pta_fee")?,
            required(self.lms_books_fee, "lms_books_fee")?,
        )
    }
}
