use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup};
use chrono::{Datelike, Duration, NaiveDate};

use crate::form::{BookingForm, FormErrors};
use crate::models::{Booking, BookingStatus, Doctor, Invoice, LabTest, Sex, TestCategory, TimeSlot};
use crate::test_orders::TestOrder;

pub const MENU_BOOK: &str = "📅 Book appointment";
pub const MENU_BOOKINGS: &str = "📋 Manage bookings";
pub const MENU_TESTS: &str = "🧪 Order tests";
pub const MENU_HELP: &str = "ℹ️ Help";

/// Escapes MarkdownV2 special characters.
pub fn escape_markdown_v2(text: &str) -> String {
    let specials = ['\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!'];
    let mut out = String::with_capacity(text.len() * 2);

    for ch in text.chars() {
        if specials.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub fn format_rupees(amount: u32) -> String {
    escape_markdown_v2(&format!("₹{}", amount))
}

pub fn format_errors(errors: &FormErrors) -> String {
    let mut text = String::from("⚠️ *Please fix the following:*\n");
    for (field, message) in errors.iter() {
        text.push_str(&format!("\n• *{}:* {}", escape_markdown_v2(field.label()), escape_markdown_v2(message)));
    }
    text
}

pub fn main_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![
            vec![KeyboardButton::new(MENU_BOOK)],
            vec![KeyboardButton::new(MENU_BOOKINGS), KeyboardButton::new(MENU_TESTS)],
            vec![KeyboardButton::new(MENU_HELP)],
        ])
        .resize_keyboard()
    )
}

fn cancel_row() -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback("❌ Cancel", "cancel_form")]
}

pub fn make_cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![cancel_row()])
}

pub fn make_sex_keyboard() -> InlineKeyboardMarkup {
    let row = Sex::ALL
        .iter()
        .map(|sex| InlineKeyboardButton::callback(sex.label(), format!("sex_{}", sex.as_str())))
        .collect();
    InlineKeyboardMarkup::new(vec![row, cancel_row()])
}

pub fn make_skip_keyboard(callback: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("⏭️ Skip", callback.to_string())],
        cancel_row(),
    ])
}

pub fn make_doctor_keyboard() -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Doctor::roster()
        .iter()
        .map(|doctor| {
            vec![InlineKeyboardButton::callback(
                format!("{} · {} · ₹{}", doctor.name, doctor.specialty, doctor.fee),
                format!("doctor_{}", doctor.id),
            )]
        })
        .collect();
    keyboard.push(cancel_row());
    InlineKeyboardMarkup::new(keyboard)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Month grid in which only days inside `[first, last]` are selectable.
pub fn make_days_keyboard(year: i32, month: u32, first: NaiveDate, last: NaiveDate) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    let month_names = [
        "January", "February", "March", "April", "May", "June",
        "July", "August", "September", "October", "November", "December",
    ];

    let month_start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(first);
    let has_prev = month_start > first.with_day(1).unwrap_or(first);
    let has_next = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)).is_some_and(|end| end < last);

    keyboard.push(vec![
        if has_prev {
            InlineKeyboardButton::callback("◀️", format!("calendar_prev_{}_{}", year, month))
        } else {
            InlineKeyboardButton::callback(" ", "calendar_ignore")
        },
        InlineKeyboardButton::callback(
            format!("{} {}", month_names[(month as usize).clamp(1, 12) - 1], year),
            "calendar_ignore",
        ),
        if has_next {
            InlineKeyboardButton::callback("▶️", format!("calendar_next_{}_{}", year, month))
        } else {
            InlineKeyboardButton::callback(" ", "calendar_ignore")
        },
    ]);

    keyboard.push(
        ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"]
            .iter()
            .map(|d| InlineKeyboardButton::callback(*d, "calendar_ignore"))
            .collect(),
    );

    let mut current_week = Vec::new();
    for _ in 0..month_start.weekday().num_days_from_monday() {
        current_week.push(InlineKeyboardButton::callback(" ", "calendar_ignore"));
    }

    for day in 1..=days_in_month(year, month) {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else { continue };

        if date < first || date > last {
            current_week.push(InlineKeyboardButton::callback("·", "calendar_ignore"));
        } else {
            current_week.push(InlineKeyboardButton::callback(
                day.to_string(),
                format!("calendar_day_{}_{}_{}", year, month, day),
            ));
        }

        if current_week.len() == 7 {
            keyboard.push(std::mem::take(&mut current_week));
        }
    }

    if !current_week.is_empty() {
        while current_week.len() < 7 {
            current_week.push(InlineKeyboardButton::callback(" ", "calendar_ignore"));
        }
        keyboard.push(current_week);
    }

    keyboard.push(cancel_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn make_calendar_keyboard(today: NaiveDate, window_days: i64) -> InlineKeyboardMarkup {
    make_days_keyboard(today.year(), today.month(), today, today + Duration::days(window_days))
}

pub fn make_slot_keyboard(selected: Option<TimeSlot>) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = TimeSlot::all()
        .into_iter()
        .map(|slot| {
            let text = if Some(slot) == selected {
                format!("✅ {}", slot.label())
            } else {
                slot.label()
            };
            InlineKeyboardButton::callback(text, format!("slot_{}", slot.code()))
        })
        .collect();

    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = buttons.chunks(3).map(|row| row.to_vec()).collect();
    keyboard.push(vec![InlineKeyboardButton::callback("◀️ Back to calendar", "calendar_reopen")]);
    keyboard.push(cancel_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn make_fee_keyboard(fee: u32) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(format!("✅ Keep ₹{}", fee), "fee_default")],
        cancel_row(),
    ])
}

pub fn make_review_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("➕ Add to queue", "book_queue")],
        vec![InlineKeyboardButton::callback("💳 Book & send UPI payment link", "book_pay")],
        cancel_row(),
    ])
}

pub fn format_form_summary(form: &BookingForm) -> String {
    let doctor = form
        .doctor_id
        .as_deref()
        .and_then(Doctor::find_by_id)
        .map(|d| format!("{} ({})", d.name, d.specialty))
        .unwrap_or_else(|| "—".to_string());
    let or_dash = |s: &str| if s.trim().is_empty() { "—".to_string() } else { s.trim().to_string() };

    format!(
        "📝 *Review appointment*\n\n\
        *Patient ID:* {}\n\
        *Name:* {}\n\
        *Contact:* \\+91 {}\n\
        *Age:* {}\n\
        *Sex:* {}\n\
        *Address:* {}\n\
        *Doctor:* {}\n\
        *Date:* {}\n\
        *Slot:* {}\n\
        *Notes:* {}\n\
        *Fee:* {}",
        escape_markdown_v2(form.patient_id.as_deref().unwrap_or("—")),
        escape_markdown_v2(&or_dash(&form.name)),
        escape_markdown_v2(&form.contact_number),
        escape_markdown_v2(&or_dash(&form.age)),
        escape_markdown_v2(form.sex.map(|s| s.label()).unwrap_or("—")),
        escape_markdown_v2(&or_dash(&form.address)),
        escape_markdown_v2(&doctor),
        escape_markdown_v2(&form.date.map(|d| d.format("%d-%m-%Y").to_string()).unwrap_or_else(|| "—".to_string())),
        escape_markdown_v2(&form.slot.map(|s| s.label()).unwrap_or_else(|| "—".to_string())),
        escape_markdown_v2(&or_dash(&form.notes)),
        format_rupees(form.fee),
    )
}

pub fn format_booking(booking: &Booking) -> String {
    let mut text = format!(
        "*{}* · {} · {}\n{} · \\+91 {} · {}\n_{}_",
        escape_markdown_v2(&booking.id),
        escape_markdown_v2(&booking.display_date()),
        escape_markdown_v2(&booking.slot.label()),
        escape_markdown_v2(&booking.name),
        escape_markdown_v2(&booking.contact_number),
        format_rupees(booking.fee),
        escape_markdown_v2(booking.status.label()),
    );
    if let Some(link) = &booking.payment_link {
        text.push_str(&format!("\nLink: `{}`", escape_markdown_v2(link)));
    }
    text
}

pub fn format_booking_list(bookings: &[Booking]) -> String {
    if bookings.is_empty() {
        return "📋 *Manage bookings*\n\nNo bookings yet\\.".to_string();
    }
    let entries: Vec<String> = bookings.iter().map(format_booking).collect();
    format!("📋 *Manage bookings*\n\n{}", entries.join("\n\n"))
}

/// One row of actions per booking that still awaits payment.
pub fn make_bookings_keyboard(bookings: &[Booking], pending_links: &[String]) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for booking in bookings.iter().filter(|b| b.status.awaits_payment()) {
        let mut row = Vec::new();
        if pending_links.contains(&booking.id) {
            row.push(InlineKeyboardButton::callback(
                format!("⏹️ Cancel sending {}", booking.id),
                format!("cancel_link_{}", booking.id),
            ));
        } else {
            row.push(InlineKeyboardButton::callback(
                format!("🔁 Resend {}", booking.id),
                format!("resend_{}", booking.id),
            ));
        }
        if booking.status == BookingStatus::PaymentSent {
            row.push(InlineKeyboardButton::callback("✅ Mark paid", format!("confirm_{}", booking.id)));
        }
        keyboard.push(row);
    }

    keyboard.push(vec![InlineKeyboardButton::callback("📅 New booking", "new_booking")]);
    InlineKeyboardMarkup::new(keyboard)
}

pub fn format_test_order(order: &TestOrder) -> String {
    let patient = match &order.patient_name {
        Some(name) => format!("{} ({})", name, order.patient_id),
        None => format!("New patient ({})", order.patient_id),
    };
    format!(
        "🧪 *Order tests*\n\n*Patient:* {}\n*Contact:* \\+91 {}\n\nTap tests to add or remove them\\.\n\n*Total:* {}",
        escape_markdown_v2(&patient),
        escape_markdown_v2(&order.contact_number),
        format_rupees(order.total()),
    )
}

pub fn make_test_catalog_keyboard(order: &TestOrder) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for category in TestCategory::ALL {
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("— {} —", category.label()),
            "calendar_ignore",
        )]);
        for test in LabTest::by_category(category) {
            let mark = if order.is_selected(test.code) { "✅" } else { "⬜" };
            keyboard.push(vec![InlineKeyboardButton::callback(
                format!("{} {} · ₹{}", mark, test.name, test.price),
                format!("test_toggle_{}", test.code),
            )]);
        }
    }

    keyboard.push(vec![InlineKeyboardButton::callback(
        format!("🧾 Create invoice (₹{})", order.total()),
        "test_submit",
    )]);
    keyboard.push(cancel_row());
    InlineKeyboardMarkup::new(keyboard)
}

pub fn format_invoice(invoice: &Invoice) -> String {
    let lines: Vec<String> = invoice
        .lines
        .iter()
        .map(|l| format!("• {} — {}", escape_markdown_v2(&l.name), format_rupees(l.price)))
        .collect();
    let mut text = format!(
        "🧾 *Invoice {}*\n\n*Patient:* {} {}\n*Contact:* \\+91 {}\n*Date:* {}\n\n{}\n\n*Total:* {}\n*Status:* {}",
        escape_markdown_v2(&invoice.number),
        escape_markdown_v2(invoice.patient_name.as_deref().unwrap_or("New patient")),
        escape_markdown_v2(&format!("({})", invoice.patient_id)),
        escape_markdown_v2(&invoice.contact_number),
        escape_markdown_v2(&invoice.created_at.format("%d-%m-%Y").to_string()),
        lines.join("\n"),
        format_rupees(invoice.total),
        escape_markdown_v2(invoice.status.label()),
    );
    if let Some(link) = &invoice.payment_link {
        text.push_str(&format!("\nLink: `{}`", escape_markdown_v2(link)));
    }
    text
}

pub fn make_invoice_keyboard(invoice: &Invoice) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "💳 Send UPI payment link",
        format!("invoice_pay_{}", invoice.number),
    )]])
}

pub fn make_link_progress_keyboard(callback: String) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("⏹️ Cancel sending", callback)]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn escapes_markdown_specials() {
        assert_eq!(escape_markdown_v2("BK10001 (2:30 PM)."), "BK10001 \\(2:30 PM\\)\\.");
        assert_eq!(escape_markdown_v2("a_b*c"), "a\\_b\\*c");
    }

    #[test]
    fn escapes_backslashes_in_user_text() {
        assert_eq!(escape_markdown_v2(r"back\pain"), r"back\\pain");
        assert_eq!(escape_markdown_v2(r"C:\(x)"), r"C:\\\(x\)");
    }

    #[test]
    fn calendar_only_offers_days_inside_window() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let markup = make_calendar_keyboard(today, 30);
        let days: Vec<String> = callbacks(&markup)
            .into_iter()
            .filter(|c| c.starts_with("calendar_day_"))
            .collect();

        assert_eq!(days.first().map(String::as_str), Some("calendar_day_2026_10_16"));
        assert_eq!(days.last().map(String::as_str), Some("calendar_day_2026_10_31"));
        assert!(callbacks(&markup).contains(&"calendar_next_2026_10".to_string()));
        assert!(!callbacks(&markup).iter().any(|c| c.starts_with("calendar_prev_")));

        let november = make_days_keyboard(2026, 11, today, today + Duration::days(30));
        let days: Vec<String> = callbacks(&november)
            .into_iter()
            .filter(|c| c.starts_with("calendar_day_"))
            .collect();
        assert_eq!(days.len(), 15);
        assert_eq!(days.last().map(String::as_str), Some("calendar_day_2026_11_15"));
    }

    #[test]
    fn days_in_month_handles_december_and_leap_years() {
        assert_eq!(days_in_month(2026, 12), 31);
        assert_eq!(days_in_month(2028, 2), 29);
        assert_eq!(days_in_month(2026, 2), 28);
    }

    #[test]
    fn bookings_keyboard_offers_actions_by_status() {
        let store = crate::store::BookingStore::seeded(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        let markup = make_bookings_keyboard(store.list(), &["BK10003".to_string()]);
        let data = callbacks(&markup);

        assert!(data.contains(&"resend_BK10002".to_string()));
        assert!(data.contains(&"cancel_link_BK10003".to_string()));
        assert!(data.contains(&"confirm_BK10003".to_string()));
        assert!(!data.iter().any(|c| c.ends_with("BK10001")));
    }
}
