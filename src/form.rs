//! Booking form: the fields collected from the front desk, their validation
//! rules and the field-level messages shown when a value is rejected.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Serialize, Deserialize};

use crate::models::{Doctor, Sex, TimeSlot};

pub const MIN_AGE: u8 = 1;
pub const MAX_AGE: u8 = 120;
pub const MIN_FEE: u32 = 100;
pub const CONTACT_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Contact,
    Name,
    Age,
    Sex,
    Doctor,
    Date,
    Slot,
    Fee,
}

impl FormField {
    /// Fields in the order the form asks for them.
    pub const ALL: [FormField; 8] = [
        FormField::Contact,
        FormField::Name,
        FormField::Age,
        FormField::Sex,
        FormField::Doctor,
        FormField::Date,
        FormField::Slot,
        FormField::Fee,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Contact => "Contact number",
            FormField::Name => "Full name",
            FormField::Age => "Age",
            FormField::Sex => "Sex",
            FormField::Doctor => "Doctor",
            FormField::Date => "Date",
            FormField::Slot => "Time slot",
            FormField::Fee => "Appointment fee",
        }
    }
}

/// Field-level validation messages, one per rejected field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormErrors(BTreeMap<FormField, String>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: FormField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn insert(&mut self, field: FormField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (FormField, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<String> = self
            .iter()
            .map(|(field, msg)| format!("{}: {}", field.label(), msg))
            .collect();
        f.write_str(&lines.join("; "))
    }
}

impl std::error::Error for FormErrors {}

/// How a completed form is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitMode {
    /// Add to the queue with payment still pending.
    Book,
    /// Add to the queue and send a payment link straight away.
    BookAndRequestPayment,
}

/// Raw form state as entered. Text fields are kept verbatim so a rejected
/// value can be shown back to the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingForm {
    pub contact_number: String,
    pub patient_id: Option<String>,
    pub name: String,
    pub age: String,
    pub sex: Option<Sex>,
    pub address: String,
    pub doctor_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub slot: Option<TimeSlot>,
    pub notes: String,
    pub fee: u32,
}

/// A form that passed validation, ready to become a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBooking {
    pub patient_id: Option<String>,
    pub name: String,
    pub contact_number: String,
    pub age: u8,
    pub sex: Sex,
    pub address: Option<String>,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub notes: String,
    pub fee: u32,
}

impl BookingForm {
    pub fn with_fee(fee: u32) -> Self {
        Self { fee, ..Self::default() }
    }

    pub fn select_doctor(&mut self, doctor: &Doctor) {
        self.doctor_id = Some(doctor.id.to_string());
        self.fee = doctor.fee;
    }

    /// Validates every field and reports all failures together.
    pub fn validate(&self, today: NaiveDate, window_days: i64) -> Result<ValidatedBooking, FormErrors> {
        let mut errors = FormErrors::default();

        let contact_number = validate_contact(&self.contact_number)
            .map_err(|e| errors.insert(FormField::Contact, e))
            .ok();
        let name = validate_name(&self.name)
            .map_err(|e| errors.insert(FormField::Name, e))
            .ok();
        let age = validate_age(&self.age)
            .map_err(|e| errors.insert(FormField::Age, e))
            .ok();
        let sex = validate_sex(self.sex)
            .map_err(|e| errors.insert(FormField::Sex, e))
            .ok();
        let doctor = validate_doctor(self.doctor_id.as_deref())
            .map_err(|e| errors.insert(FormField::Doctor, e))
            .ok();
        let date = validate_date(self.date, today, window_days)
            .map_err(|e| errors.insert(FormField::Date, e))
            .ok();
        let slot = validate_slot(self.slot)
            .map_err(|e| errors.insert(FormField::Slot, e))
            .ok();
        let fee = validate_fee(self.fee)
            .map_err(|e| errors.insert(FormField::Fee, e))
            .ok();

        match (contact_number, name, age, sex, doctor, date, slot, fee) {
            (Some(contact_number), Some(name), Some(age), Some(sex), Some(doctor), Some(date), Some(slot), Some(fee))
                if errors.is_empty() =>
            {
                Ok(ValidatedBooking {
                    patient_id: self.patient_id.clone(),
                    name,
                    contact_number,
                    age,
                    sex,
                    address: non_empty(&self.address),
                    doctor_id: doctor.id.to_string(),
                    date,
                    slot,
                    notes: self.notes.trim().to_string(),
                    fee,
                })
            }
            _ => Err(errors),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn validate_name(input: &str) -> Result<String, String> {
    non_empty(input).ok_or_else(|| "Please enter the patient's full name".to_string())
}

pub fn validate_contact(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Please enter a contact number".to_string());
    }
    if trimmed.len() != CONTACT_DIGITS || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("Contact number must be exactly {} digits", CONTACT_DIGITS));
    }
    Ok(trimmed.to_string())
}

pub fn validate_age(input: &str) -> Result<u8, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Please enter the patient's age".to_string());
    }
    match trimmed.parse::<u32>() {
        Ok(age) if (MIN_AGE as u32..=MAX_AGE as u32).contains(&age) => Ok(age as u8),
        _ => Err(format!("Age must be a whole number between {} and {}", MIN_AGE, MAX_AGE)),
    }
}

pub fn validate_sex(sex: Option<Sex>) -> Result<Sex, String> {
    sex.ok_or_else(|| "Please select sex".to_string())
}

pub fn validate_doctor(doctor_id: Option<&str>) -> Result<&'static Doctor, String> {
    match doctor_id {
        None => Err("Please select a doctor".to_string()),
        Some(id) => Doctor::find_by_id(id).ok_or_else(|| format!("Unknown doctor {}", id)),
    }
}

pub fn validate_date(date: Option<NaiveDate>, today: NaiveDate, window_days: i64) -> Result<NaiveDate, String> {
    let date = date.ok_or_else(|| "Please select a date".to_string())?;
    let last = today + Duration::days(window_days);
    if date < today || date > last {
        return Err(format!(
            "Date must be between {} and {}",
            today.format("%d-%m-%Y"),
            last.format("%d-%m-%Y")
        ));
    }
    Ok(date)
}

pub fn validate_slot(slot: Option<TimeSlot>) -> Result<TimeSlot, String> {
    match slot {
        Some(slot) if slot.is_offered() => Ok(slot),
        Some(slot) => Err(format!("{} is not an available slot", slot.label())),
        None => Err("Please select a time slot".to_string()),
    }
}

pub fn validate_fee(fee: u32) -> Result<u32, String> {
    if fee < MIN_FEE {
        return Err(format!("Fee must be at least ₹{}", MIN_FEE));
    }
    Ok(fee)
}

/// Parses a fee typed into the chat, e.g. `700` or `₹700`.
pub fn parse_fee(input: &str) -> Result<u32, String> {
    let digits = input.trim().trim_start_matches('₹').trim();
    let fee = digits
        .parse::<u32>()
        .map_err(|_| "Fee must be a whole number of rupees".to_string())?;
    validate_fee(fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn complete_form() -> BookingForm {
        let mut form = BookingForm::with_fee(500);
        form.contact_number = "9876543210".to_string();
        form.name = "  Rahul Sharma ".to_string();
        form.age = "34".to_string();
        form.sex = Some(Sex::Male);
        form.select_doctor(Doctor::find_by_id("DR02").unwrap());
        form.date = Some(today() + Duration::days(3));
        form.slot = TimeSlot::new(10, 30);
        form
    }

    #[test]
    fn contact_must_be_ten_digits() {
        assert!(validate_contact("9876543210").is_ok());
        assert!(validate_contact(" 9876543210 ").is_ok());
        assert!(validate_contact("987654321").is_err());
        assert!(validate_contact("98765432100").is_err());
        assert!(validate_contact("98765abc10").is_err());
        assert!(validate_contact("+919876543").is_err());
        assert!(validate_contact("").is_err());
    }

    #[test]
    fn age_must_be_within_bounds() {
        assert_eq!(validate_age("1"), Ok(1));
        assert_eq!(validate_age("120"), Ok(120));
        assert!(validate_age("0").is_err());
        assert!(validate_age("121").is_err());
        assert!(validate_age("-5").is_err());
        assert!(validate_age("forty").is_err());
        assert!(validate_age("300").is_err());
    }

    #[test]
    fn date_must_fall_inside_window() {
        let t = today();
        assert!(validate_date(Some(t), t, 30).is_ok());
        assert!(validate_date(Some(t + Duration::days(30)), t, 30).is_ok());
        assert!(validate_date(Some(t + Duration::days(31)), t, 30).is_err());
        assert!(validate_date(Some(t - Duration::days(1)), t, 30).is_err());
        assert!(validate_date(None, t, 30).is_err());
    }

    #[test]
    fn complete_form_validates() {
        let booking = complete_form().validate(today(), 30).unwrap();
        assert_eq!(booking.name, "Rahul Sharma");
        assert_eq!(booking.doctor_id, "DR02");
        assert_eq!(booking.fee, 800);
        assert_eq!(booking.address, None);
    }

    #[test]
    fn empty_form_reports_every_required_field() {
        let errors = BookingForm::default().validate(today(), 30).unwrap_err();
        for field in FormField::ALL {
            assert!(errors.contains(field), "missing message for {:?}", field);
        }
    }

    #[test]
    fn single_bad_field_is_reported_alone() {
        let mut form = complete_form();
        form.contact_number = "12345".to_string();
        let errors = form.validate(today(), 30).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains(FormField::Contact));
    }

    #[test]
    fn fee_parsing_accepts_rupee_sign() {
        assert_eq!(parse_fee("₹700"), Ok(700));
        assert_eq!(parse_fee(" 1200 "), Ok(1200));
        assert!(parse_fee("50").is_err());
        assert!(parse_fee("abc").is_err());
    }
}
