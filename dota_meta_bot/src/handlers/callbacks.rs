use std::sync::Arc;

use bot_commons::useful_methods::*;
use teloxide::{
    payloads::AnswerCallbackQuerySetters,
    requests::Requester,
    types::{CallbackQuery, ChatId},
    Bot, RequestError,
};

use super::{commands::ASK_FOR_HERO, send_display};
use crate::{
    pipeline::{responder::DisplayMessage, SourceSpec},
    state::BotState,
};

/// Buttons from the `/start` menu.
pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    state: Arc<BotState>,
) -> Result<(), RequestError> {
    macro_rules! goodbye {
        ($text:expr) => {
            bot.answer_callback_query(query.id).text($text).await?;
            return Ok(());
        };
        () => {
            bot.answer_callback_query(query.id).await?;
            return Ok(());
        };
    }

    if !state.is_enabled() {
        goodbye!("Replies are switched off at the moment.");
    }

    let Some(data) = query.data.as_deref() else {
        goodbye!("No query data.");
    };

    // The menu message may be too old to be accessible. Talk to the user then.
    let chat_id = query
        .message
        .as_ref()
        .map(|message| message.chat().id)
        .unwrap_or_else(|| ChatId::from(query.from.id));

    let source = match data {
        "meta" => SourceSpec::MetaLeaderboard,
        "pro" => SourceSpec::StatsApiHeroList,
        "builds" => {
            send_display(&bot, chat_id, None, DisplayMessage::plain(ASK_FOR_HERO)).await?;
            goodbye!();
        }
        _ => {
            log::warn!("Unknown callback data: {:?}", data);
            goodbye!("Unknown button. Try /start again?");
        }
    };

    // Stop the button spinner first, fetching can take a while.
    bot.answer_callback_query(query.id.clone()).await?;
    let _ = bot.typing(chat_id).await;

    let reply = state.pipeline.run(&source).await;
    send_display(&bot, chat_id, None, reply).await
}
