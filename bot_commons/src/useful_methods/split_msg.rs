use std::{future::Future, time::Duration};

use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::RequestReplyExt,
    types::{ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode},
    Bot, RequestError,
};

/// Telegram's limit on message text. Counted here in bytes, which is
/// never less than what Telegram counts.
pub const MESSAGE_LIMIT: usize = 4096;

const MAX_ATTEMPTS: u8 = 3;

pub trait BotSendSplit {
    /// Send HTML text, split into as many messages as it takes to fit
    /// the length limit. The keyboard goes under the last message.
    /// Flood waits and network hiccups are retried a couple of times.
    fn send_split(
        &self,
        to_where: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<Vec<Message>, RequestError>> + Send;
}

impl BotSendSplit for Bot {
    async fn send_split(
        &self,
        to_where: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<Vec<Message>, RequestError> {
        let chunks: Vec<&str> = SplitOverLengthTokens::new(text, MESSAGE_LIMIT).collect();
        let last = chunks.len().saturating_sub(1);
        let mut sent = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.into_iter().enumerate() {
            let mut attempt: u8 = 0;
            let message = loop {
                attempt += 1;

                let mut request = self
                    .send_message(to_where, chunk)
                    .parse_mode(ParseMode::Html);
                if let Some(reply_to) = reply_to {
                    request = request.reply_to(reply_to);
                }
                if let (true, Some(keyboard)) = (index == last, &keyboard) {
                    request = request.reply_markup(keyboard.clone());
                }

                match request.await {
                    Ok(x) => break x,
                    Err(RequestError::RetryAfter(wait)) if attempt < MAX_ATTEMPTS => {
                        log::warn!("Flood wait for {:?} in {}", wait.duration(), to_where.0);
                        tokio::time::sleep(wait.duration()).await;
                    }
                    Err(RequestError::Network(e)) if attempt < MAX_ATTEMPTS => {
                        log::warn!("Network error sending to {}, retrying: {}", to_where.0, e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    Err(e) => return Err(e),
                }
            };
            sent.push(message);
        }

        Ok(sent)
    }
}

/// Places text can be split at, biggest first.
#[derive(Clone, Copy, Debug)]
enum Separator {
    /// "\n\n\n"
    Section,
    /// "\n\n"
    Paragraph,
    /// "\n"
    Line,
    /// ASCII whitespace
    Word,
    /// Anywhere between characters.
    Char,
}

impl Separator {
    const ALL: [Separator; 5] = [
        Separator::Section,
        Separator::Paragraph,
        Separator::Line,
        Separator::Word,
        Separator::Char,
    ];

    /// Size of the separator itself, in bytes.
    fn len(self) -> usize {
        match self {
            Separator::Section => 3,
            Separator::Paragraph => 2,
            Separator::Line | Separator::Word => 1,
            Separator::Char => 0,
        }
    }

    /// Size of the piece at the start of `text`, up to the next separator.
    fn piece_len(self, text: &str) -> usize {
        match self {
            Separator::Section => text.find("\n\n\n").unwrap_or(text.len()),
            Separator::Paragraph => text.find("\n\n").unwrap_or(text.len()),
            Separator::Line => text.find('\n').unwrap_or(text.len()),
            Separator::Word => text
                .find(|x: char| x.is_ascii_whitespace())
                .unwrap_or(text.len()),
            Separator::Char => text.chars().next().map_or(0, char::len_utf8),
        }
    }
}

/// Iterator over pieces of a text, each at most `max_len` bytes.
///
/// Splits at sections (3 newlines) if that's enough, otherwise at
/// paragraphs, then lines, then words, then between characters.
/// Whitespace around the pieces is dropped.
pub struct SplitOverLengthTokens<'a> {
    rest: &'a str,
    max_len: usize,
}

impl<'a> SplitOverLengthTokens<'a> {
    /// # Panics
    /// If `max_len` is under 4, which can't fit every UTF-8 character.
    #[must_use]
    pub fn new(text: &'a str, max_len: usize) -> Self {
        assert!(max_len >= 4, "Max length is too small");
        Self {
            rest: text,
            max_len,
        }
    }
}

impl<'a> Iterator for SplitOverLengthTokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.rest = self.rest.trim_start();
        if self.rest.is_empty() {
            return None;
        }

        if self.rest.len() <= self.max_len {
            return Some(std::mem::take(&mut self.rest));
        }

        let separator = Separator::ALL
            .into_iter()
            .find(|x| x.piece_len(self.rest) <= self.max_len)
            .unwrap_or(Separator::Char);

        // Take as many whole pieces as fit, with the separators after them.
        let start = self.rest;
        let mut taken = 0;
        loop {
            let piece = separator.piece_len(self.rest);
            if taken + piece > self.max_len {
                break;
            }
            taken += piece;
            self.rest = &self.rest[piece..];

            let skip = separator.len().min(self.rest.len());
            taken += skip;
            self.rest = &self.rest[skip..];
        }

        Some(start[..taken].trim_end())
    }
}
