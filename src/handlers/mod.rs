pub mod callbacks;
pub mod commands;
pub mod flow;
pub mod messages;
pub mod payments;
pub mod utils;

pub use callbacks::callback_handler;
pub use commands::command_handler;
pub use messages::message_handler;

use std::time::Duration;
use tokio::time;

use crate::app_state::AppState;

/// Sweeps expired form drafts.
pub async fn cleanup_drafts_task(state: AppState) {
    let mut interval = time::interval(Duration::from_secs(600));

    loop {
        interval.tick().await;
        state.cleanup_cache().await;
    }
}
