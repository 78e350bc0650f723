use serde::{Serialize, Deserialize};
use chrono::{NaiveTime, Timelike};

/// Consultations start on the half hour from 9:00 until the last slot at 16:30.
pub const FIRST_HOUR: u32 = 9;
pub const CLOSING_HOUR: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSlot(NaiveTime);

impl TimeSlot {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        let slot = TimeSlot(NaiveTime::from_hms_opt(hour, minute, 0)?);
        slot.is_offered().then_some(slot)
    }

    pub fn all() -> Vec<Self> {
        (FIRST_HOUR..CLOSING_HOUR)
            .flat_map(|hour| [0, 30].into_iter().map(move |minute| (hour, minute)))
            .filter_map(|(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
            .map(TimeSlot)
            .collect()
    }

    pub fn is_offered(&self) -> bool {
        let t = self.0;
        (FIRST_HOUR..CLOSING_HOUR).contains(&t.hour())
            && (t.minute() == 0 || t.minute() == 30)
            && t.second() == 0
    }

    /// `9:00 AM`, `12:30 PM`, `4:30 PM`
    pub fn label(&self) -> String {
        let hour = self.0.hour();
        let ampm = if hour >= 12 { "PM" } else { "AM" };
        let display_hour = if hour > 12 { hour - 12 } else { hour };
        format!("{}:{:02} {}", display_hour, self.0.minute(), ampm)
    }

    /// Compact form used in callback data, e.g. `0930`.
    pub fn code(&self) -> String {
        format!("{:02}{:02}", self.0.hour(), self.0.minute())
    }

    pub fn from_code(code: &str) -> Option<Self> {
        if code.len() != 4 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hour = code[..2].parse().ok()?;
        let minute = code[2..].parse().ok()?;
        Self::new(hour, minute)
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offers_sixteen_half_hour_slots() {
        let slots = TimeSlot::all();
        assert_eq!(slots.len(), 16);
        assert_eq!(slots.first().unwrap().label(), "9:00 AM");
        assert_eq!(slots.last().unwrap().label(), "4:30 PM");
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn noon_is_pm_without_wrapping() {
        assert_eq!(TimeSlot::new(12, 0).unwrap().label(), "12:00 PM");
        assert_eq!(TimeSlot::new(14, 30).unwrap().label(), "2:30 PM");
    }

    #[test]
    fn rejects_times_outside_clinic_hours() {
        assert!(TimeSlot::new(8, 30).is_none());
        assert!(TimeSlot::new(17, 0).is_none());
        assert!(TimeSlot::new(10, 15).is_none());
        assert!(TimeSlot::from_code("1700").is_none());
        assert!(TimeSlot::from_code("9:30").is_none());
        assert_eq!(TimeSlot::from_code("0930"), TimeSlot::new(9, 30));
    }
}
