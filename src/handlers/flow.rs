use teloxide::prelude::*;
use teloxide::types::ParseMode;
use std::error::Error;

use crate::app_state::{AppState, LinkRequest, StateError};
use crate::form::{FormField, SubmitMode};
use crate::models::{DraftState, FormStep, PatientLookup};
use crate::handlers::payments::start_payment_link;
use crate::handlers::utils::{
    escape_markdown_v2, format_booking, format_booking_list, format_errors, format_form_summary,
    format_test_order, main_menu_keyboard, make_bookings_keyboard, make_calendar_keyboard,
    make_cancel_keyboard, make_doctor_keyboard, make_fee_keyboard, make_review_keyboard,
    make_sex_keyboard, make_skip_keyboard, make_slot_keyboard, make_test_catalog_keyboard,
};
use crate::test_orders::TestOrder;

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

fn step_for_field(field: FormField) -> FormStep {
    match field {
        FormField::Contact => FormStep::Contact,
        FormField::Name => FormStep::Name,
        FormField::Age => FormStep::Age,
        FormField::Sex => FormStep::Sex,
        FormField::Doctor => FormStep::Doctor,
        FormField::Date => FormStep::Date,
        FormField::Slot => FormStep::Slot,
        FormField::Fee => FormStep::Fee,
    }
}

/// Sends the prompt for whatever step the draft is on.
pub async fn prompt_step(bot: &Bot, chat_id: ChatId, state: &AppState, draft: &DraftState) -> HandlerResult {
    let config = state.config();
    match draft.step {
        FormStep::Idle => {
            bot.send_message(chat_id, "Choose an action from the menu below.")
                .reply_markup(main_menu_keyboard())
                .await?;
        }
        FormStep::Contact | FormStep::TestsContact => {
            bot.send_message(chat_id, "📞 *Contact number*\n\nEnter the patient's 10\\-digit mobile number \\(\\+91\\):")
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_cancel_keyboard())
                .await?;
        }
        FormStep::Name => {
            bot.send_message(chat_id, "👤 *Full name*\n\nEnter the patient's full name:")
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_cancel_keyboard())
                .await?;
        }
        FormStep::Age => {
            bot.send_message(chat_id, "🎂 *Age*\n\nEnter the patient's age \\(1–120\\):")
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_cancel_keyboard())
                .await?;
        }
        FormStep::Sex => {
            bot.send_message(chat_id, "⚧ *Sex*\n\nSelect one:")
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_sex_keyboard())
                .await?;
        }
        FormStep::Address => {
            bot.send_message(chat_id, "🏠 *Address*\n\nEnter the patient's address or skip:")
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_skip_keyboard("skip_address"))
                .await?;
        }
        FormStep::Doctor => {
            bot.send_message(chat_id, "🩺 *Select doctor:*")
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_doctor_keyboard())
                .await?;
        }
        FormStep::Date => {
            bot.send_message(
                chat_id,
                format!("📅 *Select date*\n\nAppointments can be booked up to {} days ahead\\.", config.booking_window_days),
            )
            .parse_mode(ParseMode::MarkdownV2)
            .reply_markup(make_calendar_keyboard(state.today(), config.booking_window_days))
            .await?;
        }
        FormStep::Slot => {
            let date = draft
                .form
                .date
                .map(|d| d.format("%d-%m-%Y").to_string())
                .unwrap_or_default();
            bot.send_message(chat_id, format!("🕘 *Select time slot* for {}:", escape_markdown_v2(&date)))
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_slot_keyboard(draft.form.slot))
                .await?;
        }
        FormStep::Notes => {
            bot.send_message(chat_id, "🗒️ *Notes for the doctor*\n\nAny symptoms or special requirements? Send them or skip:")
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_skip_keyboard("skip_notes"))
                .await?;
        }
        FormStep::Fee => {
            bot.send_message(chat_id, "💰 *Appointment fee*\n\nSend a different amount in rupees or keep the current one:")
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_fee_keyboard(draft.form.fee))
                .await?;
        }
        FormStep::Review => {
            bot.send_message(chat_id, format_form_summary(&draft.form))
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(make_review_keyboard())
                .await?;
        }
        FormStep::TestsSelecting => {
            if let Some(order) = &draft.test_order {
                bot.send_message(chat_id, format_test_order(order))
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_markup(make_test_catalog_keyboard(order))
                    .await?;
            }
        }
    }
    Ok(())
}

/// Moves the draft to `step`, stores it and prompts for the next input.
pub async fn advance(bot: &Bot, chat_id: ChatId, state: &AppState, mut draft: DraftState, step: FormStep) -> HandlerResult {
    draft.step = step;
    state.save_draft(chat_id, draft.clone()).await;
    prompt_step(bot, chat_id, state, &draft).await
}

pub async fn start_booking(bot: &Bot, chat_id: ChatId, state: &AppState) -> HandlerResult {
    state.clear_draft(chat_id).await;
    bot.send_message(chat_id, "📅 *New appointment*\n\nLet's collect the patient's details\\.")
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    let draft = DraftState::booking(state.config().default_fee);
    advance(bot, chat_id, state, draft, FormStep::Contact).await
}

pub async fn start_tests(bot: &Bot, chat_id: ChatId, state: &AppState) -> HandlerResult {
    state.clear_draft(chat_id).await;
    bot.send_message(chat_id, "🧪 *Order lab / radiology tests*\n\nFirst, find the patient\\.")
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    advance(bot, chat_id, state, DraftState::tests(), FormStep::TestsContact).await
}

pub async fn cancel_form(bot: &Bot, chat_id: ChatId, state: &AppState) -> HandlerResult {
    state.clear_draft(chat_id).await;
    bot.send_message(chat_id, "❌ Form cleared.")
        .reply_markup(main_menu_keyboard())
        .await?;
    Ok(())
}

pub async fn show_bookings(bot: &Bot, chat_id: ChatId, state: &AppState) -> HandlerResult {
    let bookings = state.bookings().await;
    let mut pending_links = Vec::new();
    for booking in &bookings {
        if state.payment_link_pending(&booking.id).await {
            pending_links.push(booking.id.clone());
        }
    }

    bot.send_message(chat_id, format_booking_list(&bookings))
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(make_bookings_keyboard(&bookings, &pending_links))
        .await?;
    Ok(())
}

/// Fetches the patient record in the background, the way the desk form
/// looks the number up once it is typed. The form carries on meanwhile.
pub fn spawn_patient_lookup(bot: Bot, chat_id: ChatId, state: AppState, contact_number: String) {
    tokio::spawn(async move {
        let Some(lookup) = state.lookup_patient(chat_id, &contact_number).await else {
            log::debug!("Lookup for chat {} superseded", chat_id);
            return;
        };

        if let Err(e) = apply_patient_lookup(&bot, chat_id, &state, &contact_number, lookup).await {
            log::error!("Error applying patient lookup for chat {}: {}", chat_id, e);
        }
    });
}

/// What a finished lookup changed in the chat's draft.
#[derive(Debug, PartialEq)]
enum LookupOutcome {
    /// The draft moved on or belongs to another number.
    Ignored,
    TestsReady,
    ReturningPatient,
    PatientId,
}

/// Merges a lookup result into the draft in place. Only fields the lookup
/// owns are touched; whatever the user entered meanwhile is kept.
fn merge_patient_lookup(draft: &mut DraftState, contact_number: &str, lookup: &PatientLookup) -> LookupOutcome {
    if draft.form.contact_number != contact_number {
        return LookupOutcome::Ignored;
    }
    match draft.step {
        FormStep::TestsContact => {
            draft.test_order = Some(TestOrder::new(contact_number, lookup));
            draft.step = FormStep::TestsSelecting;
            LookupOutcome::TestsReady
        }
        FormStep::Idle | FormStep::TestsSelecting => LookupOutcome::Ignored,
        step => {
            draft.form.patient_id = Some(lookup.patient_id().to_string());
            match lookup.name() {
                Some(name) if step == FormStep::Name => {
                    draft.form.name = name.to_string();
                    draft.step = FormStep::Age;
                    LookupOutcome::ReturningPatient
                }
                _ => LookupOutcome::PatientId,
            }
        }
    }
}

async fn apply_patient_lookup(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    contact_number: &str,
    lookup: PatientLookup,
) -> HandlerResult {
    let (outcome, draft) = state
        .update_draft(chat_id, |draft| (merge_patient_lookup(draft, contact_number, &lookup), draft.clone()))
        .await;

    match outcome {
        LookupOutcome::Ignored => Ok(()),
        LookupOutcome::TestsReady => prompt_step(bot, chat_id, state, &draft).await,
        LookupOutcome::ReturningPatient => {
            bot.send_message(
                chat_id,
                format!(
                    "🔎 Returning patient: *{}* \\({}\\)",
                    escape_markdown_v2(lookup.name().unwrap_or_default()),
                    escape_markdown_v2(lookup.patient_id())
                ),
            )
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
            prompt_step(bot, chat_id, state, &draft).await
        }
        LookupOutcome::PatientId => {
            bot.send_message(
                chat_id,
                format!("🆔 Patient ID: *{}*", escape_markdown_v2(lookup.patient_id())),
            )
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
            Ok(())
        }
    }
}

/// Turns the chat's draft into a booking. On validation failure the user is
/// sent back to the first rejected field.
pub async fn submit_booking(bot: &Bot, chat_id: ChatId, state: &AppState, mode: SubmitMode) -> HandlerResult {
    let draft = state.get_draft(chat_id).await;
    if draft.step != FormStep::Review {
        bot.send_message(chat_id, "⚠️ This form has expired. Please start a new booking.")
            .reply_markup(main_menu_keyboard())
            .await?;
        return Ok(());
    }

    match state.create_booking(&draft.form).await {
        Ok(booking) => {
            state.clear_draft(chat_id).await;
            bot.send_message(
                chat_id,
                format!("✅ *Appointment added to queue successfully\\!*\n\n{}", format_booking(&booking)),
            )
            .parse_mode(ParseMode::MarkdownV2)
            .reply_markup(main_menu_keyboard())
            .await?;

            if mode == SubmitMode::BookAndRequestPayment {
                start_payment_link(bot, chat_id, state, booking.id, LinkRequest::Initial).await?;
            }
            Ok(())
        }
        Err(StateError::Invalid(errors)) => {
            log::info!("📝 Booking form for chat {} rejected with {} errors", chat_id, errors.len());
            bot.send_message(chat_id, format_errors(&errors))
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
            let step = FormField::ALL
                .into_iter()
                .find(|field| errors.contains(*field))
                .map(step_for_field)
                .unwrap_or(FormStep::Review);
            advance(bot, chat_id, state, draft, step).await
        }
        Err(e) => {
            log::error!("Error creating booking for chat {}: {}", chat_id, e);
            bot.send_message(chat_id, "⚠️ Could not create the booking. Please try again.")
                .await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientRecord, Sex};

    fn rahul() -> PatientLookup {
        PatientLookup::Known(PatientRecord {
            patient_id: "PT10001".to_string(),
            name: "Rahul Sharma".to_string(),
            contact_number: "9876543210".to_string(),
        })
    }

    fn draft_at(step: FormStep) -> DraftState {
        let mut draft = DraftState::booking(500);
        draft.form.contact_number = "9876543210".to_string();
        draft.step = step;
        draft
    }

    #[test]
    fn lookup_keeps_answers_given_meanwhile() {
        let mut draft = draft_at(FormStep::Address);
        draft.form.sex = Some(Sex::Female);

        assert_eq!(merge_patient_lookup(&mut draft, "9876543210", &rahul()), LookupOutcome::PatientId);
        assert_eq!(draft.step, FormStep::Address);
        assert_eq!(draft.form.sex, Some(Sex::Female));
        assert_eq!(draft.form.patient_id.as_deref(), Some("PT10001"));
    }

    #[test]
    fn known_patient_fills_name_while_it_is_asked() {
        let mut draft = draft_at(FormStep::Name);
        assert_eq!(merge_patient_lookup(&mut draft, "9876543210", &rahul()), LookupOutcome::ReturningPatient);
        assert_eq!(draft.step, FormStep::Age);
        assert_eq!(draft.form.name, "Rahul Sharma");
    }

    #[test]
    fn lookup_for_another_number_is_ignored() {
        let mut draft = draft_at(FormStep::Name);
        draft.form.contact_number = "9123456780".to_string();
        assert_eq!(merge_patient_lookup(&mut draft, "9876543210", &rahul()), LookupOutcome::Ignored);
        assert_eq!(draft.form.patient_id, None);
        assert_eq!(draft.step, FormStep::Name);
    }

    #[test]
    fn tests_flow_moves_to_catalog() {
        let mut draft = DraftState::tests();
        draft.form.contact_number = "9876543210".to_string();
        assert_eq!(merge_patient_lookup(&mut draft, "9876543210", &rahul()), LookupOutcome::TestsReady);
        assert_eq!(draft.step, FormStep::TestsSelecting);
        assert_eq!(draft.test_order.unwrap().patient_id, "PT10001");
    }
}
