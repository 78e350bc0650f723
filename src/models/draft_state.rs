use serde::{Serialize, Deserialize};

use crate::form::BookingForm;
use crate::test_orders::TestOrder;

/// Which prompt the chat is currently answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FormStep {
    #[default]
    Idle,
    Contact,
    Name,
    Age,
    Sex,
    Address,
    Doctor,
    Date,
    Slot,
    Notes,
    Fee,
    Review,
    TestsContact,
    TestsSelecting,
}

/// In-progress form state for one chat.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DraftState {
    pub step: FormStep,
    pub form: BookingForm,
    pub test_order: Option<TestOrder>,
}

impl DraftState {
    pub fn booking(default_fee: u32) -> Self {
        Self {
            step: FormStep::Contact,
            form: BookingForm::with_fee(default_fee),
            test_order: None,
        }
    }

    pub fn tests() -> Self {
        Self {
            step: FormStep::TestsContact,
            ..Self::default()
        }
    }
}
