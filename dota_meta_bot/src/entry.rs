use std::{net::SocketAddr, sync::Arc};

use teloxide::{
    dptree::deps,
    prelude::*,
    update_listeners::webhooks,
};

use crate::{
    config::BotConfig,
    handlers::{callbacks::handle_callback_query, commands::Command, handle_new_message},
    state::BotState,
};

/// # Panics
///
/// Panics if there's no bot token, the config is bad, or Telegram
/// can't be reached to set the bot up.
pub async fn entry() {
    log::info!("Starting the meta bot...");

    let config = BotConfig::from_env().expect("Could not load the config!");

    log::info!(
        "Top {} results, {}s timeout, at least {} picks for pro stats.",
        config.top_n,
        config.request_timeout.as_secs(),
        config.min_picks
    );
    if config.admin_password.is_none() {
        log::warn!("ADMIN_PASSWORD is not set, admin commands are disabled.");
    }

    let bot = Bot::new(&config.token);
    let webhook = config.webhook.clone();

    let state = Arc::new(BotState::new(config).expect("Could not build the HTTP client!"));

    bot.set_my_commands(Command::generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_new_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .default_handler(|_| async {})
        .dependencies(deps![state])
        .enable_ctrlc_handler()
        .build();

    match webhook {
        Some(webhook) => {
            log::info!(
                "Dispatching the dispatcher via webhook at {} on port {}!",
                webhook.url,
                webhook.port
            );
            let address = SocketAddr::from(([0, 0, 0, 0], webhook.port));
            let listener = webhooks::axum(bot, webhooks::Options::new(address, webhook.url))
                .await
                .expect("Failed to set up the webhook!");

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("Update listener failed"),
                )
                .await;
        }
        None => {
            log::info!("Dispatching the dispatcher via long polling!");
            dispatcher.dispatch().await;
        }
    }

    log::info!("it appears we have been bonked.");
}
