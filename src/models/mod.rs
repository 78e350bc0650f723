pub mod booking;
pub mod doctor;
pub mod draft_state;
pub mod invoice;
pub mod patient;
pub mod payment_config;
pub mod time_slot;

pub use booking::{Booking, BookingStatus};
pub use doctor::Doctor;
pub use draft_state::{DraftState, FormStep};
pub use invoice::{Invoice, InvoiceLine, InvoiceStatus};
pub use lab_test::{LabTest, TestCategory};
pub use patient::{PatientLookup, PatientRecord, Sex};
pub use payment_config::PaymentConfig;
pub use time_slot::TimeSlot;
