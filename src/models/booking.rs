use serde::{Serialize, Deserialize};
use chrono::{DateTime, NaiveDate, Utc};

use super::{Sex, TimeSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    PaymentSent,
    Confirmed,
    /// Plain queue entry with no payment tracking.
    Booked,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::PaymentSent => "payment_sent",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Booked => "booked",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "Payment Pending",
            BookingStatus::PaymentSent => "Payment Link Sent",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Booked => "Booked",
        }
    }

    /// Statuses only move forward. A link may be (re)sent while payment is
    /// outstanding; confirmation requires a link to have gone out first.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (PendingPayment, PaymentSent) | (PaymentSent, PaymentSent) | (PaymentSent, Confirmed)
        )
    }

    pub fn awaits_payment(&self) -> bool {
        matches!(self, BookingStatus::PendingPayment | BookingStatus::PaymentSent)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub patient_id: Option<String>,
    pub name: String,
    pub contact_number: String,
    pub age: Option<u8>,
    pub sex: Option<Sex>,
    pub address: Option<String>,
    pub doctor_id: Option<String>,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub notes: String,
    pub fee: u32,
    pub status: BookingStatus,
    pub payment_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// `DD-MM-YYYY`, the way the front desk reads dates.
    pub fn display_date(&self) -> String {
        self.date.format("%d-%m-%Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_never_moves_backward() {
        use BookingStatus::*;
        assert!(PendingPayment.can_transition_to(PaymentSent));
        assert!(PaymentSent.can_transition_to(PaymentSent));
        assert!(PaymentSent.can_transition_to(Confirmed));

        assert!(!PaymentSent.can_transition_to(PendingPayment));
        assert!(!Confirmed.can_transition_to(PaymentSent));
        assert!(!Confirmed.can_transition_to(PendingPayment));
        assert!(!Booked.can_transition_to(PaymentSent));
        assert!(!PendingPayment.can_transition_to(Confirmed));
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&BookingStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"pending_payment\"");
        let parsed: BookingStatus = serde_json::from_str("\"payment_sent\"").unwrap();
        assert_eq!(parsed, BookingStatus::PaymentSent);
    }
}
