//! Long-polling loop for the Telegram transport.

use crate::dispatcher::Dispatcher;
use crate::telegram::{TelegramTransport, Update};
use qna_core::AppResult;
use std::sync::Arc;
use std::time::Duration;

const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Feed updates to the dispatcher until Ctrl-C.
pub async fn run_polling(
    transport: Arc<TelegramTransport>,
    dispatcher: Dispatcher,
    timeout_secs: u64,
) -> AppResult<()> {
    tracing::info!("Bot polling started (timeout {}s)", timeout_secs);
    let mut offset = 0;

    loop {
        let updates = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested, stopping bot");
                return Ok(());
            }
            result = transport.get_updates(offset, timeout_secs) => result,
        };

        match updates {
            Ok(updates) => offset = dispatch_batch(&dispatcher, updates, offset).await,
            Err(e) => {
                tracing::warn!("getUpdates failed: {}; retrying in {:?}", e, RETRY_DELAY);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

/// Dispatch a batch in order and return the next offset to confirm.
async fn dispatch_batch(dispatcher: &Dispatcher, updates: Vec<Update>, mut offset: i64) -> i64 {
    for update in updates {
        offset = offset.max(update.id + 1);

        let Some(event) = update.event else {
            tracing::trace!("Skipping update {}", update.id);
            continue;
        };

        if let Err(e) = dispatcher.handle(event).await {
            tracing::error!("Update {} failed: {}", update.id, e);
        }
    }
    offset
}
