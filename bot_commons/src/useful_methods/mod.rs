mod split_msg;
pub use split_msg::*;

use std::future::Future;

use teloxide::{
    requests::Requester,
    types::{ChatAction, ChatId, Message, User},
    Bot, RequestError,
};

pub trait MessageStuff {
    /// Text of the message, or its caption if it's media.
    fn text_full(&self) -> Option<&str>;
    /// A `@username` of the sender if there is one, otherwise their full
    /// name, otherwise the title of the chat that sent this.
    fn sender_display_name(&self) -> String;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }

    fn sender_display_name(&self) -> String {
        if let Some(user) = self.from.as_ref() {
            return user_display_name(user);
        }

        if let Some(chat) = self.sender_chat.as_ref() {
            if let Some(username) = chat.username() {
                return format!("@{}", username);
            }
            if let Some(title) = chat.title() {
                return title.to_string();
            }
        }

        // Shouldn't happen, but eh.
        "a private user".to_string()
    }
}

/// `@username` if the user has one, full name otherwise.
pub fn user_display_name(user: &User) -> String {
    if let Some(username) = &user.username {
        format!("@{}", username)
    } else {
        user.full_name()
    }
}

pub trait BotStuff {
    fn typing(&self, to_where: ChatId) -> impl Future<Output = Result<(), RequestError>> + Send;
}

impl BotStuff for Bot {
    async fn typing(&self, to_where: ChatId) -> Result<(), RequestError> {
        self.send_chat_action(to_where, ChatAction::Typing).await?;
        Ok(())
    }
}
