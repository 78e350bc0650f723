use teloxide::types::ParseMode;
use teloxide::prelude::*;
use std::error::Error;

use crate::app_state::AppState;
use crate::handlers::flow::{cancel_form, show_bookings, start_booking, start_tests};
use crate::handlers::utils::main_menu_keyboard;

use crate::Command;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: AppState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match cmd {
        Command::Start => handle_start(bot, msg).await?,
        Command::Help => handle_help(bot, msg).await?,
        Command::Book => start_booking(&bot, msg.chat.id, &state).await?,
        Command::Bookings => show_bookings(&bot, msg.chat.id, &state).await?,
        Command::Tests => start_tests(&bot, msg.chat.id, &state).await?,
        Command::Cancel => cancel_form(&bot, msg.chat.id, &state).await?,
    }
    Ok(())
}

async fn handle_start(
    bot: Bot,
    msg: Message,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let start_text = "🏥 *Medical Appointment Booking*\n\n\
        Front desk assistant for booking consultations and ordering tests\\.\n\n\
        📋 *Commands:*\n\
        /book – book an appointment\n\
        /bookings – manage bookings and payment links\n\
        /tests – order lab or radiology tests\n\
        /cancel – clear the current form\n\
        /help – how it works\n\n\
        💳 *UPI payment:* after choosing \"Book & send UPI payment link\", \
        a payment link is sent to the patient's mobile number by SMS\\.";

    bot.send_message(msg.chat.id, start_text)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(main_menu_keyboard())
        .await?;

    Ok(())
}

async fn handle_help(
    bot: Bot,
    msg: Message,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    bot.send_message(
        msg.chat.id,
        "ℹ️ *How it works*\n\n\
        1\\. Enter the patient's mobile number, records are fetched automatically\n\
        2\\. Fill in name, age, sex, address and pick a doctor\n\
        3\\. Choose a date from the calendar and a half\\-hour slot\n\
        4\\. Add notes, confirm the fee\n\
        5\\. Add to the queue, or book and send a UPI payment link\n\n\
        Use /bookings to resend links or mark payments as received\\."
    )
    .parse_mode(ParseMode::MarkdownV2)
    .await?;

    Ok(())
}
