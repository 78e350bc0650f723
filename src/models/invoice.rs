use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    PaymentSent,
}

impl InvoiceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "Payment Pending",
            InvoiceStatus::PaymentSent => "Payment Link Sent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub code: String,
    pub name: String,
    pub price: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub number: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub contact_number: String,
    pub lines: Vec<InvoiceLine>,
    pub total: u32,
    pub status: InvoiceStatus,
    pub payment_link: Option<String>,
    pub created_at: DateTime<Utc>,
}
