use anyhow::{bail, Context, Result};
use shared::domain::ConversationKey;

pub const HELP: &str = "\
commands:
  /connect                 open the socket (after a failure or rejected login)
  /login <user> <password> authenticate
  /list [query]            list conversations, optionally filtered
  /recent [n]              latest arrivals across all conversations (default 10)
  /open <phone>            select a conversation and load its latest page
  /more                    load older messages for the open conversation
  /send <text>             send to the open conversation (plain text works too)
  /pay [amount] [days]     send a payment link to the open conversation
  /profile                 show the open conversation's profile
  /status                  connection state and the current notification
  /quit                    exit";

const DEFAULT_RECENT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Login { username: String, password: String },
    List { query: Option<String> },
    Recent(usize),
    Open(ConversationKey),
    More,
    Send(String),
    Pay { amount: Option<u64>, days: Option<u32> },
    Profile,
    Status,
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`; text without a leading `/` is a message.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "connect" => Command::Connect,
        "login" => {
            let mut parts = args.split_whitespace();
            let (Some(username), Some(password)) = (parts.next(), parts.next()) else {
                bail!("usage: /login <user> <password>");
            };
            Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            }
        }
        "list" => Command::List {
            query: (!args.is_empty()).then(|| args.to_string()),
        },
        "recent" => {
            let limit = match args {
                "" => DEFAULT_RECENT,
                n => n.parse().context("count must be a whole number")?,
            };
            Command::Recent(limit)
        }
        "open" => {
            if args.is_empty() {
                bail!("usage: /open <phone>");
            }
            Command::Open(ConversationKey::canonicalize(args))
        }
        "more" => Command::More,
        "send" => {
            if args.is_empty() {
                bail!("usage: /send <text>");
            }
            Command::Send(args.to_string())
        }
        "pay" => {
            let mut parts = args.split_whitespace();
            let amount = parts
                .next()
                .map(str::parse::<u64>)
                .transpose()
                .context("amount must be a whole number")?;
            let days = parts
                .next()
                .map(str::parse::<u32>)
                .transpose()
                .context("days must be a whole number")?;
            Command::Pay { amount, days }
        }
        "profile" => Command::Profile,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command /{other}; try /help"),
    };
    Ok(Some(command))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
