use chrono::{Duration, NaiveDate, Utc};

use crate::form::ValidatedBooking;
use crate::ids::{self, IdTag};
use crate::models::{Booking, BookingStatus, TimeSlot};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("booking {0} not found")]
    NotFound(String),
    #[error("booking {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: BookingStatus,
        to: BookingStatus,
    },
}

/// Ordered in-memory list of bookings. Entries are appended and updated in
/// place; nothing is ever removed.
#[derive(Debug, Default)]
pub struct BookingStore {
    bookings: Vec<Booking>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the front desk's demo bookings, dated
    /// relative to `today`.
    pub fn seeded(today: NaiveDate) -> Self {
        let mock = |id: &str, days: i64, slot: TimeSlot, name: &str, contact: &str, status: BookingStatus, fee: u32, link: Option<&str>| Booking {
            id: id.to_string(),
            patient_id: None,
            name: name.to_string(),
            contact_number: contact.to_string(),
            age: None,
            sex: None,
            address: None,
            doctor_id: None,
            date: today + Duration::days(days),
            slot,
            notes: String::new(),
            fee,
            status,
            payment_link: link.map(str::to_string),
            created_at: Utc::now(),
        };

        let mut store = Self::new();
        let seeds = [
            (TimeSlot::new(10, 0), "BK10001", 1, "Priya Patel", "8765432101", BookingStatus::Confirmed, 500, None),
            (TimeSlot::new(14, 30), "BK10002", 2, "Arun Kumar", "9876543212", BookingStatus::PendingPayment, 500, None),
            (TimeSlot::new(11, 0), "BK10003", 3, "Neha Sharma", "7654321098", BookingStatus::PaymentSent, 700, Some("shorturl.at/wxyz1")),
        ];
        for (slot, id, days, name, contact, status, fee, link) in seeds {
            if let Some(slot) = slot {
                store.bookings.push(mock(id, days, slot, name, contact, status, fee, link));
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn list(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bookings.iter().any(|b| b.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn next_id(&self) -> String {
        ids::generate_unique(IdTag::Booking, |candidate| self.contains(candidate))
    }

    /// Appends a booking built from a validated form. New bookings always
    /// start out awaiting payment.
    pub fn append(&mut self, form: ValidatedBooking) -> Booking {
        let booking = Booking {
            id: self.next_id(),
            patient_id: form.patient_id,
            name: form.name,
            contact_number: form.contact_number,
            age: Some(form.age),
            sex: Some(form.sex),
            address: form.address,
            doctor_id: Some(form.doctor_id),
            date: form.date,
            slot: form.slot,
            notes: form.notes,
            fee: form.fee,
            status: BookingStatus::PendingPayment,
            payment_link: None,
            created_at: Utc::now(),
        };
        self.bookings.push(booking.clone());
        booking
    }

    /// Moves the booking to `next`, rejecting any transition that is not
    /// forward. Returns the updated booking.
    pub fn transition(&mut self, id: &str, next: BookingStatus) -> Result<&mut Booking, StoreError> {
        let booking = self
            .bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !booking.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: booking.status,
                to: next,
            });
        }
        booking.status = next;
        Ok(booking)
    }

    pub fn mark_payment_sent(&mut self, id: &str, link: String) -> Result<Booking, StoreError> {
        let booking = self.transition(id, BookingStatus::PaymentSent)?;
        booking.payment_link = Some(link);
        Ok(booking.clone())
    }

    pub fn mark_confirmed(&mut self, id: &str) -> Result<Booking, StoreError> {
        self.transition(id, BookingStatus::Confirmed).map(|b| b.clone())
    }
}
