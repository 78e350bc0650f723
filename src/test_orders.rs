//! Diagnostic test ordering: a per-patient selection over the lab and
//! radiology catalog, and the invoices produced from submitted selections.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Serialize, Deserialize};

use crate::ids::{self, IdTag};
use crate::models::{Invoice, InvoiceLine, InvoiceStatus, LabTest, PatientLookup};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TestOrderError {
    #[error("unknown test code {0}")]
    UnknownTest(String),
    #[error("select at least one test")]
    Empty,
    #[error("invoice {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOrder {
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub contact_number: String,
    selected: BTreeSet<String>,
}

impl TestOrder {
    pub fn new(contact_number: &str, lookup: &PatientLookup) -> Self {
        Self {
            patient_id: lookup.patient_id().to_string(),
            patient_name: lookup.name().map(str::to_string),
            contact_number: contact_number.to_string(),
            selected: BTreeSet::new(),
        }
    }

    /// Adds the test if absent, removes it if present. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&mut self, code: &str) -> Result<bool, TestOrderError> {
        let test = LabTest::find_by_code(code).ok_or_else(|| TestOrderError::UnknownTest(code.to_string()))?;
        if self.selected.remove(test.code) {
            Ok(false)
        } else {
            self.selected.insert(test.code.to_string());
            Ok(true)
        }
    }

    pub fn is_selected(&self, code: &str) -> bool {
        self.selected.contains(code)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected tests in catalog order.
    pub fn selected_tests(&self) -> impl Iterator<Item = &'static LabTest> + '_ {
        LabTest::catalog().iter().filter(|t| self.selected.contains(t.code))
    }

    pub fn total(&self) -> u32 {
        self.selected_tests().map(|t| t.price).sum()
    }

    pub fn to_invoice(&self, number: String) -> Result<Invoice, TestOrderError> {
        if self.is_empty() {
            return Err(TestOrderError::Empty);
        }
        let lines: Vec<InvoiceLine> = self
            .selected_tests()
            .map(|t| InvoiceLine {
                code: t.code.to_string(),
                name: t.name.to_string(),
                price: t.price,
            })
            .collect();
        let total = lines.iter().map(|l| l.price).sum();

        Ok(Invoice {
            number,
            patient_id: self.patient_id.clone(),
            patient_name: self.patient_name.clone(),
            contact_number: self.contact_number.clone(),
            lines,
            total,
            status: InvoiceStatus::Pending,
            payment_link: None,
            created_at: Utc::now(),
        })
    }
}

/// Invoices issued for test orders. Kept apart from the booking store.
#[derive(Debug, Default)]
pub struct InvoiceBook {
    invoices: Vec<Invoice>,
}

impl InvoiceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, number: &str) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.number == number)
    }

    pub fn issue(&mut self, order: &TestOrder) -> Result<Invoice, TestOrderError> {
        let number = ids::generate_unique(IdTag::Invoice, |candidate| self.get(candidate).is_some());
        let invoice = order.to_invoice(number)?;
        self.invoices.push(invoice.clone());
        Ok(invoice)
    }

    pub fn mark_payment_sent(&mut self, number: &str, link: String) -> Result<Invoice, TestOrderError> {
        let invoice = self
            .invoices
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| TestOrderError::NotFound(number.to_string()))?;
        invoice.status = InvoiceStatus::PaymentSent;
        invoice.payment_link = Some(link);
        Ok(invoice.clone())
    }
}
