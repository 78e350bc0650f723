use teloxide::{prelude::*, utils::command::BotCommands};

mod app_state;
mod config;
mod form;
mod handlers;
mod ids;
mod models;
mod patients;
mod payment;
mod store;
mod tasks;
mod test_orders;

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::models::PaymentConfig;
use crate::handlers::{callback_handler, command_handler, message_handler};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the front desk assistant")]
    Start,
    #[command(description = "show help")]
    Help,
    #[command(description = "book an appointment")]
    Book,
    #[command(description = "manage bookings and payment links")]
    Bookings,
    #[command(description = "order lab or radiology tests")]
    Tests,
    #[command(description = "clear the current form")]
    Cancel,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env and initialise logging
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting clinic booking bot...");

    let config = AppConfig::from_env()?;
    let payment_config = PaymentConfig::from_env();
    log::info!(
        "✅ Config loaded: fee ₹{}, window {} days, payee {}",
        config.default_fee,
        config.booking_window_days,
        payment_config.upi_id
    );

    let state = AppState::new(config, payment_config);
    log::info!("✅ Booking store seeded with {} bookings", state.booking_count().await);

    let state_clone = state.clone();
    tokio::spawn(async move {
        handlers::cleanup_drafts_task(state_clone).await;
    });

    let bot = Bot::from_env();
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("⚠️ Could not register bot commands: {}", e);
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler)
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    log::info!("🚀 Starting dispatcher...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
