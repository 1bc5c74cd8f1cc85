//! Console host: a slash-command REPL wired to a [`Bot`].
//!
//! ```text
//! /test-add subject:"IB Physics" date:02/05/2027 portion:Waves
//! /pomdorro studytime:25 breaktime:5 sessioncount:4
//! /pause            (latest session of the acting user)
//! /cancel <session>
//! /select IB Physics, IB ESS
//! /as 1234
//! /quit
//! ```

use std::sync::Arc;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use studyroom_core::ai::GroqClient;
use studyroom_core::bot::{
    BotDeps, ComponentInteraction, HttpAttachmentLoader, SUBJECT_SELECT_ID,
};
use studyroom_core::integrations::{
    credential, ConsoleMessenger, DiscordWebhook, AI_API_KEY, AI_API_KEY_ENV,
};
use studyroom_core::timer::{button_id, ControlAction};
use studyroom_core::{
    Bot, ChannelId, CommandInvocation, Config, Database, Interaction, LopdfExtractor, Messenger,
    OptionValue, ReminderScheduler, TextGenerator, UserId,
};

#[derive(Args)]
pub struct RunArgs {
    /// Acting user id (defaults to bot.console_user)
    #[arg(long)]
    user: Option<String>,
    /// Display name of the acting user (defaults to bot.console_username)
    #[arg(long)]
    username: Option<String>,
    /// Channel name (defaults to bot.console_channel)
    #[arg(long)]
    channel: Option<String>,
    /// Use a throwaway in-memory database
    #[arg(long)]
    memory: bool,
}

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Empty,
    Help,
    Quit,
    As(String),
    Select(Vec<String>),
    Control {
        action: ControlAction,
        session: Option<String>,
    },
    Command {
        name: String,
        options: Vec<(String, String)>,
    },
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    // One thread: sessions, reminders and input share a cooperative loop.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(repl(args))
}

fn build_bot(config: Config, memory: bool) -> Result<Bot, Box<dyn std::error::Error>> {
    let database = if memory {
        Database::open_memory()?
    } else {
        Database::open(&config.database_path()?)?
    };

    let console: Arc<dyn Messenger> = Arc::new(ConsoleMessenger::new());
    let reminder_messenger: Arc<dyn Messenger> = match DiscordWebhook::from_credentials() {
        Some(Ok(webhook)) => {
            info!("reminders will be posted to the Discord webhook");
            Arc::new(webhook)
        }
        Some(Err(e)) => {
            warn!(error = %e, "ignoring Discord webhook; reminders stay in the console");
            Arc::clone(&console)
        }
        None => Arc::clone(&console),
    };

    let generator: Option<Arc<dyn TextGenerator>> = match credential(AI_API_KEY, AI_API_KEY_ENV) {
        Some(key) => {
            let client: Arc<dyn TextGenerator> = Arc::new(GroqClient::new(&config.ai, key)?);
            Some(client)
        }
        None => {
            warn!("no AI API key configured; summarize, explain and exam-plan will fail");
            None
        }
    };

    let deps = BotDeps {
        store: Arc::new(database),
        messenger: console,
        generator,
        extractor: Arc::new(LopdfExtractor),
        attachments: Arc::new(HttpAttachmentLoader::new(config.ai.timeout_secs)?),
        reminders: ReminderScheduler::new(reminder_messenger),
    };
    Ok(Bot::new(deps, config))
}

async fn repl(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut user = UserId::new(args.user.unwrap_or_else(|| config.bot.console_user.clone()));
    let mut username = args
        .username
        .unwrap_or_else(|| config.bot.console_username.clone());
    let channel = ChannelId::new(args.channel.unwrap_or_else(|| config.bot.console_channel.clone()));
    let bot = build_bot(config, args.memory)?;

    println!("studyroom console on #{channel} as {username} ({user}). Type /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match parse_line(&line) {
            Ok(input) => input,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };
        match input {
            Input::Empty => {}
            Input::Help => print_help(),
            Input::Quit => break,
            Input::As(id) => {
                username = id.clone();
                user = UserId::new(id);
                println!("now acting as {user}");
            }
            Input::Select(values) => {
                bot.handle(Interaction::Component(ComponentInteraction {
                    custom_id: SUBJECT_SELECT_ID.to_string(),
                    values,
                    user: user.clone(),
                    username: username.clone(),
                    channel: channel.clone(),
                    message: None,
                }))
                .await;
            }
            Input::Control { action, session } => {
                let session = session.or_else(|| {
                    bot.sessions()
                        .latest_for(&user)
                        .map(|h| h.id().to_string())
                });
                let Some(session) = session else {
                    eprintln!("no running session for {user}; pass a session id");
                    continue;
                };
                bot.handle(Interaction::Component(ComponentInteraction {
                    custom_id: button_id(&session, action),
                    values: Vec::new(),
                    user: user.clone(),
                    username: username.clone(),
                    channel: channel.clone(),
                    message: None,
                }))
                .await;
            }
            Input::Command { name, options } => {
                let invocation = options.into_iter().fold(
                    CommandInvocation::new(name, user.clone(), username.clone(), channel.clone()),
                    |inv, (key, value)| inv.option(key, OptionValue::String(value)),
                );
                bot.handle(Interaction::Command(invocation)).await;
            }
        }
    }

    let pending = bot.reminders().pending();
    if pending > 0 {
        println!("{pending} pending reminder(s) dropped on exit");
    }
    Ok(())
}

fn print_help() {
    println!(
        "commands:
  /profile, /viewprofile user:<id>
  /test-add subject:<name> date:dd/mm/yyyy portion:<text>, /test-list
  /deadline subject:<name> work:<text> date:dd/mm/yyyy, /deadline-list
  /pomdorro studytime:<min> breaktime:<min> sessioncount:<n>
  /summarize file:<path or url>, /explain question:<text>, /exam-plan
console:
  /select a, b        answer the subject menu
  /pause|/resume|/cancel [session]
  /as <user>          switch acting user
  /quit"
    );
}

fn parse_line(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(body) = line.strip_prefix('/') else {
        return Err("commands start with '/', try /help".to_string());
    };
    let (head, rest) = match body.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (body, ""),
    };

    let input = match head {
        "" => return Err("missing command name".to_string()),
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        "as" if rest.is_empty() => return Err("usage: /as <user>".to_string()),
        "as" => Input::As(rest.to_string()),
        "select" => Input::Select(
            rest.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        ),
        "pause" | "resume" | "cancel" => Input::Control {
            action: head.parse().map_err(|_| format!("unknown action {head}"))?,
            session: (!rest.is_empty()).then(|| rest.to_string()),
        },
        name => {
            let options = tokenize(rest)?
                .into_iter()
                .map(|token| match token.split_once(':') {
                    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
                    _ => Err(format!("expected key:value, got `{token}`")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Input::Command {
                name: name.to_string(),
                options,
            }
        }
    };
    Ok(input)
}

/// Split on whitespace outside double quotes, dropping the quotes.
fn tokenize(s: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut started = false;
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    if started {
        tokens.push(current);
    }
    Ok(tokens)
}
