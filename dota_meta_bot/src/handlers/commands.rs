use std::{fmt::Write, future::Future, pin::Pin};

use bot_commons::useful_methods::*;
use html_escape::encode_text;
use teloxide::{
    types::{BotCommand, Me, Message},
    Bot, RequestError,
};

use crate::{
    config::BotConfig,
    lookup::{lookup_hero, web_search},
    pipeline::{
        responder::{DisplayMessage, ReplyButton},
        types::Query,
        SourceSpec,
    },
    state::BotState,
};

pub const COMMANDS: &[Command] = &[
    START,
    HELP,
    META,
    BUILD,
    PRO,
    HERO,
    SEARCH,
    MEMORY,
    ____SEPARATOR,
    ADMIN,
    TRANSCRIPT,
    FORGET,
];

/// `None` means nothing to reply with.
pub type Ret = Result<Option<DisplayMessage>, RequestError>;
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Ret> + Send + 'a>>;

pub struct CommandParams<'a> {
    pub state: &'a BotState,
    pub bot: &'a Bot,
    pub bot_me: &'a Me,
    pub message: &'a Message,
    pub message_text: &'a str,
    pub command_len: usize,
}

impl<'a> CommandParams<'a> {
    /// `None` if the message doesn't start with a command.
    pub fn new(
        state: &'a BotState,
        bot: &'a Bot,
        bot_me: &'a Me,
        message: &'a Message,
    ) -> Option<Self> {
        let message_text = message.text_full()?;
        let command_len = command_token(message_text)?.len();

        Some(Self {
            state,
            bot,
            bot_me,
            message,
            message_text,
            command_len,
        })
    }

    /// The command in the table this message calls. Commands addressed
    /// to another bot, like `/meta@SomeOtherBot`, are not ours.
    pub fn find_command(&self) -> Option<&'static Command> {
        match split_addressee(self.command()) {
            (_, Some(bot_name)) if !bot_name.eq_ignore_ascii_case(self.bot_me.username()) => None,
            (callname, _) => lookup_command(callname),
        }
    }

    /// `/build` out of `/build storm spirit`.
    #[inline]
    pub fn command(&self) -> &str {
        &self.message_text[..self.command_len]
    }

    /// `storm spirit` out of `/build storm spirit`.
    #[inline]
    pub fn get_params(&self) -> &str {
        self.message_text[self.command_len..].trim()
    }
}

/// The leading `/word` of a text. Telegram command names are ASCII only.
fn command_token(text: &str) -> Option<&str> {
    if !text.starts_with('/') {
        return None;
    }
    text.split_whitespace().next().filter(|x| x.is_ascii())
}

/// `/meta@SomeBot` is `/meta` addressed to `SomeBot`.
fn split_addressee(command: &str) -> (&str, Option<&str>) {
    match command.split_once('@') {
        Some((callname, bot_name)) => (callname, Some(bot_name)),
        None => (command, None),
    }
}

fn lookup_command(callname: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|x| x.is_matching_callname(callname))
}

/// What the transcript keeps of a message. Admin commands carry the
/// password in their parameters, so only the command itself is kept.
pub fn transcript_text(text: &str) -> &str {
    let Some(command) = command_token(text) else {
        return text;
    };

    match lookup_command(split_addressee(command).0) {
        Some(found) if found.admin => command,
        _ => text,
    }
}

pub struct Command {
    pub callname: &'static str,
    pub description: &'static str,
    pub function: fn(CommandParams) -> CommandFuture,
    /// Works even when replies are switched off.
    pub admin: bool,
    hidden: bool,
}

impl Command {
    pub fn is_matching_callname(&self, command: &str) -> bool {
        !command.is_empty()
            && self
                .callname
                .split_ascii_whitespace()
                .next()
                .is_some_and(|x| x.eq_ignore_ascii_case(command))
    }

    /// Admin commands run even while replies are switched off.
    pub fn is_allowed(&self, replies_enabled: bool) -> bool {
        self.admin || replies_enabled
    }

    pub fn get_help(&self, mut output: impl std::fmt::Write) -> Result<(), std::fmt::Error> {
        // useful for the separator "command"
        if self.callname.is_empty() && self.description.is_empty() {
            return Ok(());
        }

        output.write_str(self.callname)?;
        if !self.description.is_empty() {
            output.write_str(" - ")?;
            output.write_str(self.description)?;
        }

        Ok(())
    }

    pub fn generate_help() -> String {
        let mut response = String::from("HELP:\n\n");
        for command in COMMANDS {
            if command.hidden || command.callname.is_empty() {
                continue;
            }
            let _ = command.get_help(&mut response);
            response += "\n";
        }
        response.push_str("\nOr just send me a hero name to get their item build.");
        response
    }

    pub fn generate_bot_commands() -> Vec<BotCommand> {
        COMMANDS
            .iter()
            .filter(|command| !command.hidden)
            .filter_map(|command| {
                let callname = command.callname.split_ascii_whitespace().next()?;
                // Cut off the /
                let callname = callname.strip_prefix('/')?.trim().to_string();
                let description = command
                    .description
                    .replace("&lt;", "<")
                    .replace("&gt;", ">");
                Some(BotCommand::new(callname, description))
            })
            .collect()
    }
}

/// The greeting menu. Callback data is handled in [`super::callbacks`].
pub fn start_menu() -> DisplayMessage {
    DisplayMessage::plain("Hi! I'm a Dota 2 meta bot 💎\nPick something:")
        .with_button(ReplyButton::Callback {
            caption: "🔥 Meta".to_string(),
            data: "meta".to_string(),
        })
        .with_button(ReplyButton::Callback {
            caption: "⚔️ Builds".to_string(),
            data: "builds".to_string(),
        })
        .with_button(ReplyButton::Callback {
            caption: "🏆 Pro stats".to_string(),
            data: "pro".to_string(),
        })
}

pub const ASK_FOR_HERO: &str = concat!(
    "Send me a hero name in Latin letters, ",
    "for example <code>sven</code>, <code>lion</code>, <code>invoker</code>."
);

pub const ACCESS_DENIED: &str = "⛔ Access denied.";

/// Splits the password off the front of an admin command's parameters.
/// Returns the rest of them if the password is right.
pub fn strip_admin_password<'p>(config: &BotConfig, params: &'p str) -> Option<&'p str> {
    let (password, rest) = params
        .split_once(char::is_whitespace)
        .unwrap_or((params, ""));
    config.is_admin_password(password).then(|| rest.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    On,
    Off,
    Status,
}

impl AdminAction {
    /// No action at all means status.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            "" | "status" => Some(Self::Status),
            _ => None,
        }
    }

    pub fn apply(self, state: &BotState) -> &'static str {
        match self {
            Self::On => {
                state.set_enabled(true);
                "✅ Replies are on."
            }
            Self::Off => {
                state.set_enabled(false);
                "💤 Replies are off."
            }
            Self::Status if state.is_enabled() => "Replies are currently on.",
            Self::Status => "Replies are currently off.",
        }
    }
}

///////////////////////////////////////
/////////////////COMMAND DEFINITIONS
///////////////////////////////////////

/// Wraps the function's return value in a pinning closure.
macro_rules! wrap {
    ($thing:expr) => {
        |cp| Box::pin($thing(cp))
    };
}

macro_rules! goodbye {
    ($text:expr) => {
        return Ok(Some(DisplayMessage::plain($text)))
    };
    () => {
        return Ok(None)
    };
}

/// Evaluates to the parameters after the admin password, or denies access.
macro_rules! check_password {
    ($cp:expr) => {
        match strip_admin_password(&$cp.state.config, $cp.get_params()) {
            Some(rest) => rest,
            None => {
                log::warn!(
                    "Wrong admin password for {} from {}",
                    $cp.command(),
                    $cp.message.sender_display_name()
                );
                goodbye!(ACCESS_DENIED);
            }
        }
    };
}

/// Show typing while the pipeline runs.
async fn run_pipeline(cp: &CommandParams<'_>, source: SourceSpec) -> Ret {
    let _ = cp.bot.typing(cp.message.chat.id).await;
    Ok(Some(cp.state.pipeline.run(&source).await))
}

pub const START: Command = Command {
    callname: "/start",
    description: "show the menu",
    function: wrap!(start),
    admin: false,
    hidden: false,
};
async fn start(_cp: CommandParams<'_>) -> Ret {
    Ok(Some(start_menu()))
}

pub const HELP: Command = Command {
    callname: "/help",
    description: "this list",
    function: wrap!(help),
    admin: false,
    hidden: false,
};
async fn help(_cp: CommandParams<'_>) -> Ret {
    goodbye!(Command::generate_help());
}

pub const META: Command = Command {
    callname: "/meta",
    description: "heroes with the best win rate right now",
    function: wrap!(meta),
    admin: false,
    hidden: false,
};
async fn meta(cp: CommandParams<'_>) -> Ret {
    run_pipeline(&cp, SourceSpec::MetaLeaderboard).await
}

pub const BUILD: Command = Command {
    callname: "/build &lt;hero&gt;",
    description: "best items for a hero",
    function: wrap!(build),
    admin: false,
    hidden: false,
};
async fn build(cp: CommandParams<'_>) -> Ret {
    let Some(query) = Query::new(cp.get_params()) else {
        goodbye!(ASK_FOR_HERO);
    };
    run_pipeline(&cp, SourceSpec::HeroItemPage(query)).await
}

pub const PRO: Command = Command {
    callname: "/pro",
    description: "heroes with the best win rate in pro matches",
    function: wrap!(pro),
    admin: false,
    hidden: false,
};
async fn pro(cp: CommandParams<'_>) -> Ret {
    run_pipeline(&cp, SourceSpec::StatsApiHeroList).await
}

pub const HERO: Command = Command {
    callname: "/hero &lt;name&gt;",
    description: "look a hero up in the stats API",
    function: wrap!(hero),
    admin: false,
    hidden: false,
};
async fn hero(cp: CommandParams<'_>) -> Ret {
    let Some(query) = Query::new(cp.get_params()) else {
        goodbye!(ASK_FOR_HERO);
    };
    let _ = cp.bot.typing(cp.message.chat.id).await;
    Ok(Some(lookup_hero(cp.state.pipeline.fetcher(), &query).await))
}

pub const SEARCH: Command = Command {
    callname: "/search &lt;topic&gt;",
    description: "search the internet",
    function: wrap!(search),
    admin: false,
    hidden: false,
};
async fn search(cp: CommandParams<'_>) -> Ret {
    let topic = cp.get_params();
    if topic.is_empty() {
        goodbye!("🔎 What should I look for? For example:\n<code>/search pudge</code>");
    }
    let _ = cp.bot.typing(cp.message.chat.id).await;
    Ok(Some(web_search(cp.state.pipeline.fetcher(), topic).await))
}

pub const MEMORY: Command = Command {
    callname: "/memory",
    description: "how many messages are in the transcript",
    function: wrap!(memory),
    admin: false,
    hidden: false,
};
async fn memory(cp: CommandParams<'_>) -> Ret {
    goodbye!(format!(
        "🧾 The transcript holds {} messages (at most {}).",
        cp.state.transcript.len().await,
        cp.state.config.transcript_cap
    ));
}

#[allow(non_upper_case_globals)]
pub const ____SEPARATOR: Command = Command {
    callname: "",
    description: "",
    function: wrap!(separator),
    admin: false,
    hidden: true,
};
async fn separator(_cp: CommandParams<'_>) -> Ret {
    goodbye!();
}

pub const ADMIN: Command = Command {
    callname: "/admin &lt;password&gt; on|off|status",
    description: "switch replies on or off for everyone",
    function: wrap!(admin),
    admin: true,
    hidden: true,
};
async fn admin(cp: CommandParams<'_>) -> Ret {
    let Some(action) = AdminAction::parse(check_password!(cp)) else {
        goodbye!("Usage: <code>/admin &lt;password&gt; on|off|status</code>");
    };

    if action != AdminAction::Status {
        log::info!(
            "{:?} for replies from {}",
            action,
            cp.message.sender_display_name()
        );
    }

    goodbye!(action.apply(cp.state));
}

pub const TRANSCRIPT: Command = Command {
    callname: "/transcript &lt;password&gt;",
    description: "show the latest transcript entries",
    function: wrap!(transcript),
    admin: true,
    hidden: true,
};
async fn transcript(cp: CommandParams<'_>) -> Ret {
    check_password!(cp);

    let entries = cp.state.transcript.recent(10).await;
    if entries.is_empty() {
        goodbye!("The transcript is empty.");
    }

    let mut response = String::from("🧾 Latest messages:\n");
    for entry in entries {
        let _ = write!(
            response,
            "\n<b>{}</b> {} ({}):\n{}\n",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            encode_text(&entry.username),
            entry
                .user_id
                .map_or_else(|| "no id".to_string(), |x| x.to_string()),
            encode_text(&entry.text)
        );
    }

    goodbye!(response);
}

pub const FORGET: Command = Command {
    callname: "/forget &lt;password&gt;",
    description: "clear the transcript",
    function: wrap!(forget),
    admin: true,
    hidden: true,
};
async fn forget(cp: CommandParams<'_>) -> Ret {
    check_password!(cp);

    if let Err(e) = cp.state.transcript.clear().await {
        log::error!("Failed to clear the transcript: {}", e);
        goodbye!("❌ Couldn't clear the transcript, check the logs.");
    }

    goodbye!("🧹 The transcript is cleared.");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{
        strip_admin_password, transcript_text, AdminAction, Command, ADMIN, COMMANDS, FORGET,
        META, TRANSCRIPT,
    };
    use crate::{config::BotConfig, state::BotState};

    fn config_with(vars: &[(&str, &str)]) -> BotConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup("123:abc".to_string(), |var| vars.get(var).cloned()).unwrap()
    }

    #[test]
    fn callnames() {
        let build = COMMANDS
            .iter()
            .find(|x| x.is_matching_callname("/BUILD"))
            .unwrap();
        assert!(build.callname.starts_with("/build"));

        assert!(COMMANDS.iter().all(|x| !x.is_matching_callname("")));
        assert!(COMMANDS.iter().all(|x| !x.is_matching_callname("/buil")));
    }

    #[test]
    fn bot_commands_skip_hidden() {
        let commands = Command::generate_bot_commands();
        let names: Vec<&str> = commands.iter().map(|x| x.command.as_str()).collect();
        assert_eq!(
            names,
            ["start", "help", "meta", "build", "pro", "hero", "search", "memory"]
        );
        assert!(commands
            .iter()
            .all(|x| !x.description.contains("&lt;") && !x.description.is_empty()));
    }

    #[test]
    fn help_mentions_visible_commands_only() {
        let help = Command::generate_help();
        assert!(help.contains("/build &lt;hero&gt; - best items for a hero"));
        assert!(!help.contains("/admin"));
        assert!(!help.contains("/forget"));
    }

    #[test]
    fn admin_passwords() {
        let config = config_with(&[("ADMIN_PASSWORD", "hunter2")]);
        assert_eq!(strip_admin_password(&config, "hunter2 off"), Some("off"));
        assert_eq!(strip_admin_password(&config, "hunter2"), Some(""));
        assert_eq!(strip_admin_password(&config, "hunter2\n  status "), Some("status"));
        assert_eq!(strip_admin_password(&config, "hunter3 off"), None);
        assert_eq!(strip_admin_password(&config, "off hunter2"), None);
        assert_eq!(strip_admin_password(&config, ""), None);

        // No password configured means nobody gets in.
        let config = config_with(&[]);
        assert_eq!(strip_admin_password(&config, ""), None);
        assert_eq!(strip_admin_password(&config, "hunter2 off"), None);
    }

    #[test]
    fn admin_actions() {
        assert_eq!(AdminAction::parse("ON"), Some(AdminAction::On));
        assert_eq!(AdminAction::parse("off"), Some(AdminAction::Off));
        assert_eq!(AdminAction::parse(""), Some(AdminAction::Status));
        assert_eq!(AdminAction::parse("status"), Some(AdminAction::Status));
        assert_eq!(AdminAction::parse("maybe"), None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        let state = BotState::new(config_with(&[(
            "TRANSCRIPT_PATH",
            path.to_str().unwrap(),
        )]))
        .unwrap();

        assert!(state.is_enabled());
        assert_eq!(AdminAction::Status.apply(&state), "Replies are currently on.");

        AdminAction::Off.apply(&state);
        assert!(!state.is_enabled());
        assert_eq!(AdminAction::Status.apply(&state), "Replies are currently off.");

        // Switching off twice is fine.
        AdminAction::Off.apply(&state);
        assert!(!state.is_enabled());

        AdminAction::On.apply(&state);
        assert!(state.is_enabled());
    }

    #[test]
    fn switched_off_gate() {
        assert!(META.is_allowed(true));
        assert!(!META.is_allowed(false));
        for command in [&ADMIN, &TRANSCRIPT, &FORGET] {
            assert!(command.is_allowed(false));
        }
        assert!(COMMANDS
            .iter()
            .filter(|x| !x.is_allowed(false))
            .all(|x| !x.admin));
    }

    #[test]
    fn passwords_stay_out_of_the_transcript() {
        assert_eq!(transcript_text("/admin hunter2 off"), "/admin");
        assert_eq!(transcript_text("/ADMIN hunter2"), "/ADMIN");
        assert_eq!(transcript_text("/transcript@DotaMetaBot hunter2"), "/transcript@DotaMetaBot");
        assert_eq!(transcript_text("/forget\nhunter2"), "/forget");

        assert_eq!(transcript_text("/build storm spirit"), "/build storm spirit");
        assert_eq!(transcript_text("sven"), "sven");
        assert_eq!(transcript_text("my password is /admin"), "my password is /admin");
    }
}
