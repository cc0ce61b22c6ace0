use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LedgerError, Result};

/// the record an invoice number was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceOwner {
    Payment(Uuid),
    OtherPayment(Uuid),
}

/// system-wide invoice namespace, shared by tuition and itemized payments
///
/// Numbers compare trimmed and case-insensitively. Once issued a number stays
/// reserved, including after its record is edited away or soft-deleted.
#[derive(Debug, Default)]
pub struct InvoiceRegistry {
    issued: HashMap<String, InvoiceOwner>,
}

impl InvoiceRegistry {
    pub fn new() -> Self {
        Self {
            issued: HashMap::new(),
        }
    }

    /// canonical key for an invoice number, rejecting blanks
    pub fn normalize(invoice_number: &str) -> Result<String> {
        let trimmed = invoice_number.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::validation("invoice number is required"));
        }
        Ok(trimmed.to_ascii_uppercase())
    }

    pub fn is_issued(&self, invoice_number: &str) -> bool {
        Self::normalize(invoice_number)
            .map(|key| self.issued.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn owner(&self, invoice_number: &str) -> Option<InvoiceOwner> {
        let key = Self::normalize(invoice_number).ok()?;
        self.issued.get(&key).copied()
    }

    /// fail if the number is held by a different record
    pub fn check_available(&self, invoice_number: &str, owner: InvoiceOwner) -> Result<()> {
        let key = Self::normalize(invoice_number)?;
        match self.issued.get(&key) {
            Some(existing) if *existing != owner => Err(LedgerError::DuplicateInvoice {
                invoice_number: invoice_number.trim().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// reserve a number for a record; re-reserving for the same owner is a no-op
    pub fn reserve(&mut self, invoice_number: &str, owner: InvoiceOwner) -> Result<()> {
        self.check_available(invoice_number, owner)?;
        let key = Self::normalize(invoice_number)?;
        self.issued.insert(key, owner);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_duplicate() {
        let mut registry = InvoiceRegistry::new();
        let a = InvoiceOwner::Payment(Uuid::new_v4());
        let b = InvoiceOwner::OtherPayment(Uuid::new_v4());

        registry.reserve("INV-0001", a).unwrap();
        assert!(registry.is_issued("inv-0001"));

        let err = registry.reserve(" inv-0001 ", b).unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateInvoice {
                invoice_number: "inv-0001".to_string()
            }
        );

        // same owner may re-reserve its own number
        registry.reserve("INV-0001", a).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.owner("INV-0001"), Some(a));
    }

    #[test]
    fn test_blank_invoice_rejected() {
        let mut registry = InvoiceRegistry::new();
        let result = registry.reserve("   ", InvoiceOwner::Payment(Uuid::new_v4()));
        assert!(matches!(result, Err(LedgerError::Validation { .. })));
        assert!(registry.is_empty());
    }
}
