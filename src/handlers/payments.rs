use teloxide::prelude::*;
use teloxide::types::ParseMode;
use std::error::Error;

use crate::app_state::{AppState, LinkRequest};
use crate::handlers::utils::{escape_markdown_v2, format_invoice, make_link_progress_keyboard};

/// Starts a simulated payment link for a booking. The chat is told right
/// away that sending is in progress and again once the delay resolves.
pub async fn start_payment_link(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    booking_id: String,
    kind: LinkRequest,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    log::info!("🔄 Payment link requested for booking {} ({:?})", booking_id, kind);

    bot.send_message(
        chat_id,
        format!("⏳ Sending UPI payment link for {}…", escape_markdown_v2(&booking_id)),
    )
    .parse_mode(ParseMode::MarkdownV2)
    .reply_markup(make_link_progress_keyboard(format!("cancel_link_{}", booking_id)))
    .await?;

    let bot = bot.clone();
    let state = state.clone();
    tokio::spawn(async move {
        let text = match state.request_payment_link(&booking_id, kind).await {
            Ok(Some(booking)) => format!(
                "✅ *Payment link sent to \\+91 {}*\n\nBooking {} · {}\nLink: `{}`\n\nPlease complete payment to confirm the appointment\\.",
                escape_markdown_v2(&booking.contact_number),
                escape_markdown_v2(&booking.id),
                escape_markdown_v2(booking.status.label()),
                escape_markdown_v2(booking.payment_link.as_deref().unwrap_or_default()),
            ),
            Ok(None) => format!("⏹️ Sending the payment link for {} was cancelled\\.", escape_markdown_v2(&booking_id)),
            Err(e) => {
                log::warn!("❌ Payment link for {} failed: {}", booking_id, e);
                format!("⚠️ {}", escape_markdown_v2(&e.to_string()))
            }
        };

        if let Err(e) = bot.send_message(chat_id, text).parse_mode(ParseMode::MarkdownV2).await {
            log::error!("Error notifying chat {} about booking {}: {}", chat_id, booking_id, e);
        }
    });

    Ok(())
}

/// Same flow as [`start_payment_link`] for a test-order invoice.
pub async fn start_invoice_link(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    invoice_number: String,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    log::info!("🔄 Payment link requested for invoice {}", invoice_number);

    bot.send_message(
        chat_id,
        format!("⏳ Sending UPI payment link for {}…", escape_markdown_v2(&invoice_number)),
    )
    .parse_mode(ParseMode::MarkdownV2)
    .reply_markup(make_link_progress_keyboard(format!("invoice_cancel_{}", invoice_number)))
    .await?;

    let bot = bot.clone();
    let state = state.clone();
    tokio::spawn(async move {
        let text = match state.request_invoice_link(&invoice_number).await {
            Ok(Some(invoice)) => format!(
                "✅ *Payment link sent to \\+91 {}*\n\n{}",
                escape_markdown_v2(&invoice.contact_number),
                format_invoice(&invoice),
            ),
            Ok(None) => format!("⏹️ Sending the payment link for {} was cancelled\\.", escape_markdown_v2(&invoice_number)),
            Err(e) => {
                log::warn!("❌ Payment link for {} failed: {}", invoice_number, e);
                format!("⚠️ {}", escape_markdown_v2(&e.to_string()))
            }
        };

        if let Err(e) = bot.send_message(chat_id, text).parse_mode(ParseMode::MarkdownV2).await {
            log::error!("Error notifying chat {} about invoice {}: {}", chat_id, invoice_number, e);
        }
    });

    Ok(())
}
