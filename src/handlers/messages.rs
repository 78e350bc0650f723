use teloxide::prelude::*;
use teloxide::types::ParseMode;
use std::error::Error;

use crate::app_state::AppState;
use crate::form::{parse_fee, validate_age, validate_contact, validate_name};
use crate::models::{DraftState, FormStep, Sex};
use crate::handlers::flow::{advance, prompt_step, show_bookings, spawn_patient_lookup, start_booking, start_tests};
use crate::handlers::utils::{escape_markdown_v2, main_menu_keyboard, MENU_BOOK, MENU_BOOKINGS, MENU_HELP, MENU_TESTS};

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;

    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "👋 Please reply with text or use the menu.")
            .reply_markup(main_menu_keyboard())
            .await?;
        return Ok(());
    };

    // Commands are handled by command_handler
    if text.starts_with('/') {
        return Ok(());
    }

    match text {
        MENU_BOOK => return start_booking(&bot, chat_id, &state).await,
        MENU_BOOKINGS => return show_bookings(&bot, chat_id, &state).await,
        MENU_TESTS => return start_tests(&bot, chat_id, &state).await,
        MENU_HELP => {
            bot.send_message(chat_id, "Use /book to book an appointment, /bookings to manage them and /tests to order tests.")
                .await?;
            return Ok(());
        }
        _ => {}
    }

    let draft = state.get_draft(chat_id).await;
    handle_form_input(&bot, chat_id, &state, draft, text).await
}

async fn reject(bot: &Bot, chat_id: ChatId, message: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    bot.send_message(chat_id, format!("⚠️ {}", escape_markdown_v2(message)))
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

async fn handle_form_input(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    mut draft: DraftState,
    text: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match draft.step {
        FormStep::Contact => match validate_contact(text) {
            Ok(contact) => {
                draft.form.contact_number = contact.clone();
                draft.form.patient_id = None;
                advance(bot, chat_id, state, draft, FormStep::Name).await?;
                spawn_patient_lookup(bot.clone(), chat_id, state.clone(), contact);
            }
            Err(e) => reject(bot, chat_id, &e).await?,
        },
        FormStep::TestsContact => match validate_contact(text) {
            Ok(contact) => {
                draft.form.contact_number = contact.clone();
                state.save_draft(chat_id, draft).await;
                bot.send_message(chat_id, "🔎 Fetching patient records…").await?;
                spawn_patient_lookup(bot.clone(), chat_id, state.clone(), contact);
            }
            Err(e) => reject(bot, chat_id, &e).await?,
        },
        FormStep::Name => match validate_name(text) {
            Ok(name) => {
                draft.form.name = name;
                advance(bot, chat_id, state, draft, FormStep::Age).await?;
            }
            Err(e) => reject(bot, chat_id, &e).await?,
        },
        FormStep::Age => match validate_age(text) {
            Ok(_) => {
                draft.form.age = text.trim().to_string();
                advance(bot, chat_id, state, draft, FormStep::Sex).await?;
            }
            Err(e) => reject(bot, chat_id, &e).await?,
        },
        FormStep::Sex => match Sex::parse(text) {
            Some(sex) => {
                draft.form.sex = Some(sex);
                advance(bot, chat_id, state, draft, FormStep::Address).await?;
            }
            None => prompt_step(bot, chat_id, state, &draft).await?,
        },
        FormStep::Address => {
            draft.form.address = text.trim().to_string();
            advance(bot, chat_id, state, draft, FormStep::Doctor).await?;
        }
        FormStep::Notes => {
            draft.form.notes = text.trim().to_string();
            advance(bot, chat_id, state, draft, FormStep::Fee).await?;
        }
        FormStep::Fee => match parse_fee(text) {
            Ok(fee) => {
                draft.form.fee = fee;
                advance(bot, chat_id, state, draft, FormStep::Review).await?;
            }
            Err(e) => reject(bot, chat_id, &e).await?,
        },
        FormStep::Doctor | FormStep::Date | FormStep::Slot | FormStep::Review | FormStep::TestsSelecting => {
            // These steps are answered with buttons
            prompt_step(bot, chat_id, state, &draft).await?;
        }
        FormStep::Idle => {
            bot.send_message(chat_id, "👋 Choose an action from the menu to get started.")
                .reply_markup(main_menu_keyboard())
                .await?;
        }
    }
    Ok(())
}
