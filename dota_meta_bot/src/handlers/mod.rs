pub mod callbacks;
pub mod commands;

use std::sync::Arc;

use bot_commons::useful_methods::*;
use chrono::Utc;
use teloxide::{
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Me, Message, MessageId},
    Bot, RequestError,
};

use crate::{
    pipeline::{
        responder::{DisplayMessage, ReplyButton},
        types::Query,
        SourceSpec,
    },
    state::BotState,
    transcript::TranscriptEntry,
};
use commands::CommandParams;

/// Send a [`DisplayMessage`] with HTML formatting, split if it's too long,
/// with its buttons under the last part.
pub async fn send_display(
    bot: &Bot,
    chat_id: ChatId,
    reply_to: Option<MessageId>,
    display: DisplayMessage,
) -> Result<(), RequestError> {
    let keyboard = (!display.buttons.is_empty()).then(|| {
        let rows = display.buttons.into_iter().map(|button| {
            vec![match button {
                ReplyButton::Link { caption, url } => InlineKeyboardButton::url(caption, url),
                ReplyButton::Callback { caption, data } => {
                    InlineKeyboardButton::callback(caption, data)
                }
            }]
        });
        InlineKeyboardMarkup::new(rows)
    });

    bot.send_split(chat_id, &display.text, reply_to, keyboard)
        .await?;
    Ok(())
}

/// Put the message into the transcript. Failing to do so is not a reason
/// to not reply, so errors are only logged.
async fn record_in_transcript(state: &BotState, message: &Message, text: &str) {
    let entry = TranscriptEntry {
        timestamp: Utc::now(),
        user_id: message.from.as_ref().map(|user| user.id.0),
        username: message.sender_display_name(),
        text: text.to_string(),
    };

    if let Err(e) = state.transcript.append(entry).await {
        log::error!("Failed to write the transcript: {}", e);
    }
}

pub async fn handle_new_message(
    bot: Bot,
    me: Me,
    message: Message,
    state: Arc<BotState>,
) -> Result<(), RequestError> {
    // Bot ignores messages made by itself.
    if message.from.as_ref().map(|from| from.id) == Some(me.id) {
        return Ok(());
    }

    let Some(text) = message.text_full() else {
        return Ok(());
    };

    record_in_transcript(&state, &message, commands::transcript_text(text)).await;

    if let Some(params) = CommandParams::new(&state, &bot, &me, &message) {
        let Some(command) = params.find_command() else {
            // Not ours, or not a command we know. lol
            return Ok(());
        };

        if !command.is_allowed(state.is_enabled()) {
            log::debug!("Replies are off, ignoring {}", params.command());
            return Ok(());
        }

        log::debug!(
            "{} from {}",
            params.command(),
            message.sender_display_name()
        );

        if let Some(reply) = (command.function)(params).await? {
            send_display(&bot, message.chat.id, Some(message.id), reply).await?;
        }

        return Ok(());
    }

    // Plain text in a DM is a hero name. In groups it's just people talking.
    if !message.chat.is_private() || !state.is_enabled() {
        return Ok(());
    }

    let reply = match Query::new(text) {
        Some(query) => {
            let _ = bot.typing(message.chat.id).await;
            state.pipeline.run(&SourceSpec::HeroItemPage(query)).await
        }
        None => DisplayMessage::plain(commands::ASK_FOR_HERO),
    };

    send_display(&bot, message.chat.id, Some(message.id), reply).await
}
