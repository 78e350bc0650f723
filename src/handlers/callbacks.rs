use teloxide::prelude::*;
use teloxide::types::ParseMode;
use std::error::Error;
use chrono::{Datelike, Duration, NaiveDate};

use crate::app_state::{AppState, LinkRequest};
use crate::form::SubmitMode;
use crate::models::{Doctor, FormStep, Sex, TimeSlot};
use crate::handlers::flow::{advance, cancel_form, show_bookings, start_booking, submit_booking};
use crate::handlers::payments::{start_invoice_link, start_payment_link};
use crate::handlers::utils::{
    escape_markdown_v2, format_booking, format_invoice, format_test_order,
    make_days_keyboard, make_invoice_keyboard, make_test_catalog_keyboard,
};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    bot.answer_callback_query(q.id.clone()).await?;

    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    match data {
        "calendar_ignore" => {}

        "cancel_form" => cancel_form(&bot, chat_id, &state).await?,

        "new_booking" => start_booking(&bot, chat_id, &state).await?,

        "show_bookings" => show_bookings(&bot, chat_id, &state).await?,

        data if data.starts_with("sex_") => {
            let mut draft = state.get_draft(chat_id).await;
            if let (FormStep::Sex, Some(sex)) = (draft.step, data.strip_prefix("sex_").and_then(Sex::parse)) {
                draft.form.sex = Some(sex);
                advance(&bot, chat_id, &state, draft, FormStep::Address).await?;
            }
        }

        "skip_address" => {
            let mut draft = state.get_draft(chat_id).await;
            if draft.step == FormStep::Address {
                draft.form.address.clear();
                advance(&bot, chat_id, &state, draft, FormStep::Doctor).await?;
            }
        }

        data if data.starts_with("doctor_") => {
            let mut draft = state.get_draft(chat_id).await;
            let doctor = data.strip_prefix("doctor_").and_then(Doctor::find_by_id);
            if let (FormStep::Doctor, Some(doctor)) = (draft.step, doctor) {
                draft.form.select_doctor(doctor);
                bot.send_message(
                    chat_id,
                    format!(
                        "🩺 {} · {}",
                        escape_markdown_v2(doctor.name),
                        escape_markdown_v2(doctor.specialty)
                    ),
                )
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
                advance(&bot, chat_id, &state, draft, FormStep::Date).await?;
            }
        }

        "calendar_reopen" => {
            let draft = state.get_draft(chat_id).await;
            if matches!(draft.step, FormStep::Date | FormStep::Slot) {
                advance(&bot, chat_id, &state, draft, FormStep::Date).await?;
            }
        }

        data if data.starts_with("calendar_prev_") || data.starts_with("calendar_next_") => {
            handle_calendar_navigation(&bot, chat_id, message_id, &state, data).await?;
        }

        data if data.starts_with("calendar_day_") => {
            let mut draft = state.get_draft(chat_id).await;
            if draft.step != FormStep::Date {
                return Ok(());
            }
            match parse_calendar_day(data) {
                Some(date) => {
                    draft.form.date = Some(date);
                    draft.form.slot = None;
                    advance(&bot, chat_id, &state, draft, FormStep::Slot).await?;
                }
                None => log::warn!("Malformed calendar callback: {}", data),
            }
        }

        data if data.starts_with("slot_") => {
            let mut draft = state.get_draft(chat_id).await;
            if let (FormStep::Slot, Some(slot)) = (draft.step, data.strip_prefix("slot_").and_then(TimeSlot::from_code)) {
                draft.form.slot = Some(slot);
                advance(&bot, chat_id, &state, draft, FormStep::Notes).await?;
            }
        }

        "skip_notes" => {
            let mut draft = state.get_draft(chat_id).await;
            if draft.step == FormStep::Notes {
                draft.form.notes.clear();
                advance(&bot, chat_id, &state, draft, FormStep::Fee).await?;
            }
        }

        "fee_default" => {
            let draft = state.get_draft(chat_id).await;
            if draft.step == FormStep::Fee {
                advance(&bot, chat_id, &state, draft, FormStep::Review).await?;
            }
        }

        "book_queue" => submit_booking(&bot, chat_id, &state, SubmitMode::Book).await?,

        "book_pay" => submit_booking(&bot, chat_id, &state, SubmitMode::BookAndRequestPayment).await?,

        data if data.starts_with("resend_") => {
            if let Some(id) = data.strip_prefix("resend_") {
                start_payment_link(&bot, chat_id, &state, id.to_string(), LinkRequest::Resend).await?;
            }
        }

        data if data.starts_with("cancel_link_") => {
            if let Some(id) = data.strip_prefix("cancel_link_") {
                if !state.cancel_payment_link(id).await {
                    bot.send_message(chat_id, "ℹ️ Nothing to cancel, the link has already gone out.")
                        .await?;
                }
            }
        }

        data if data.starts_with("confirm_") => {
            if let Some(id) = data.strip_prefix("confirm_") {
                handle_confirm(&bot, chat_id, &state, id).await?;
            }
        }

        data if data.starts_with("test_toggle_") => {
            let mut draft = state.get_draft(chat_id).await;
            let code = data.strip_prefix("test_toggle_").unwrap_or_default();
            if draft.step != FormStep::TestsSelecting {
                return Ok(());
            }
            let Some(order) = draft.test_order.as_mut() else {
                return Ok(());
            };
            if let Err(e) = order.toggle(code) {
                log::warn!("Test toggle rejected: {}", e);
                return Ok(());
            }
            let text = format_test_order(order);
            let keyboard = make_test_catalog_keyboard(order);
            state.save_draft(chat_id, draft).await;

            bot.edit_message_text(chat_id, message_id, text)
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(keyboard)
                .await?;
        }

        "test_submit" => {
            let draft = state.get_draft(chat_id).await;
            let Some(order) = draft.test_order.as_ref().filter(|_| draft.step == FormStep::TestsSelecting) else {
                return Ok(());
            };
            match state.issue_invoice(order).await {
                Ok(invoice) => {
                    state.clear_draft(chat_id).await;
                    bot.send_message(chat_id, format_invoice(&invoice))
                        .parse_mode(ParseMode::MarkdownV2)
                        .reply_markup(make_invoice_keyboard(&invoice))
                        .await?;
                }
                Err(e) => {
                    bot.send_message(chat_id, format!("⚠️ {}", escape_markdown_v2(&e.to_string())))
                        .parse_mode(ParseMode::MarkdownV2)
                        .await?;
                }
            }
        }

        data if data.starts_with("invoice_pay_") => {
            if let Some(number) = data.strip_prefix("invoice_pay_") {
                start_invoice_link(&bot, chat_id, &state, number.to_string()).await?;
            }
        }

        data if data.starts_with("invoice_cancel_") => {
            if let Some(number) = data.strip_prefix("invoice_cancel_") {
                if !state.cancel_invoice_link(number).await {
                    bot.send_message(chat_id, "ℹ️ Nothing to cancel, the link has already gone out.")
                        .await?;
                }
            }
        }

        other => log::warn!("Unhandled callback data: {}", other),
    }

    Ok(())
}

async fn handle_confirm(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    id: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let text = match state.confirm_payment(id).await {
        Ok(booking) => format!("🎉 *Payment received*\n\n{}", format_booking(&booking)),
        Err(e) => format!("⚠️ {}", escape_markdown_v2(&e.to_string())),
    };
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

/// `calendar_day_<year>_<month>_<day>`
fn parse_calendar_day(data: &str) -> Option<NaiveDate> {
    let mut parts = data.strip_prefix("calendar_day_")?.split('_');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `calendar_prev_<year>_<month>` / `calendar_next_<year>_<month>`
fn shifted_month(data: &str) -> Option<(i32, u32)> {
    let (forward, rest) = match data.strip_prefix("calendar_next_") {
        Some(rest) => (true, rest),
        None => (false, data.strip_prefix("calendar_prev_")?),
    };
    let (year, month) = rest.split_once('_')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(match (forward, month) {
        (true, 12) => (year + 1, 1),
        (true, m) => (year, m + 1),
        (false, 1) => (year - 1, 12),
        (false, m) => (year, m - 1),
    })
}

async fn handle_calendar_navigation(
    bot: &Bot,
    chat_id: ChatId,
    message_id: teloxide::types::MessageId,
    state: &AppState,
    data: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some((year, month)) = shifted_month(data) else {
        log::warn!("Malformed calendar callback: {}", data);
        return Ok(());
    };

    let today = state.today();
    let last = today + Duration::days(state.config().booking_window_days);
    let in_window = (year, month) >= (today.year(), today.month()) && (year, month) <= (last.year(), last.month());
    if in_window {
        bot.edit_message_reply_markup(chat_id, message_id)
            .reply_markup(make_days_keyboard(year, month, today, last))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_calendar_day_callbacks() {
        assert_eq!(parse_calendar_day("calendar_day_2026_10_31"), NaiveDate::from_ymd_opt(2026, 10, 31));
        assert_eq!(parse_calendar_day("calendar_day_2026_02_30"), None);
        assert_eq!(parse_calendar_day("calendar_day_2026_10"), None);
    }

    #[test]
    fn month_navigation_wraps_years() {
        assert_eq!(shifted_month("calendar_next_2026_12"), Some((2027, 1)));
        assert_eq!(shifted_month("calendar_prev_2027_1"), Some((2026, 12)));
        assert_eq!(shifted_month("calendar_next_2026_10"), Some((2026, 11)));
        assert_eq!(shifted_month("calendar_next_2026_13"), None);
    }
}
