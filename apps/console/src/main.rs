mod commands;
mod config;
mod render;

use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Instant};

use anyhow::Result;
use clap::Parser;
use client_core::{notifications::NotificationSlot, ClientEvent, ConsoleClient};
use shared::domain::{ConversationKey, Message};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{broadcast::error::RecvError, Mutex},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use commands::Command;

#[derive(Parser, Debug)]
#[command(about = "Operator console for live customer conversations")]
struct Args {
    /// Config file; defaults to ./console.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    history_limit: Option<u32>,
    /// Do not replay the login after a reconnect.
    #[arg(long)]
    no_reauth: bool,
}

impl Args {
    fn apply(&self, settings: &mut config::Settings) {
        if let Some(url) = &self.server_url {
            settings.server_url = url.clone();
        }
        if let Some(limit) = self.history_limit {
            settings.history_limit = limit;
        }
        if self.no_reauth {
            settings.reauthenticate_on_reconnect = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    args.apply(&mut settings);
    info!(server_url = %settings.server_url, "starting console");

    let client = ConsoleClient::new(settings.to_client_settings());
    let slot = Arc::new(Mutex::new(NotificationSlot::default()));
    let printer = tokio::spawn(print_events(
        client.clone(),
        client.subscribe_events(),
        slot.clone(),
    ));

    match client.connect().await {
        Ok(()) => {
            if let (Some(username), Some(password)) = (&args.username, &args.password) {
                if let Err(err) = client.login(username, password).await {
                    debug!(error = %err, "startup login rejected");
                }
            }
        }
        Err(err) => warn!(error = %err, "initial connect failed; use /connect to retry"),
    }
    println!("{}", commands::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err:#}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        run_command(&client, command, &slot).await;
    }

    client.shutdown().await;
    printer.abort();
    Ok(())
}

async fn run_command(client: &Arc<ConsoleClient>, command: Command, slot: &Mutex<NotificationSlot>) {
    // Rejected intents already surface as notifications.
    let result = match command {
        Command::Connect => client.connect().await,
        Command::Login { username, password } => client.login(&username, &password).await,
        Command::List { query } => {
            list_conversations(client, query.as_deref()).await;
            Ok(())
        }
        Command::Recent(limit) => {
            list_recent(client, limit).await;
            Ok(())
        }
        Command::Open(key) => client.select_conversation(key).await,
        Command::More => match client.load_more_history().await {
            Ok(false) => {
                println!("nothing more to load");
                Ok(())
            }
            other => other.map(|_| ()),
        },
        Command::Send(text) => match selected_key(client).await {
            Some(key) => client.send_message(&key, &text).await,
            None => Ok(()),
        },
        Command::Pay { amount, days } => match selected_key(client).await {
            Some(key) => client.send_payment_link(&key, amount, days).await,
            None => Ok(()),
        },
        Command::Profile => {
            if let Some(key) = selected_key(client).await {
                show_profile(client, &key).await;
            }
            Ok(())
        }
        Command::Status => {
            println!("status: {:?}", client.connection_state().await);
            if let Some(notification) = slot.lock().await.visible(Instant::now()) {
                println!("{}", render::notification_line(notification));
            }
            Ok(())
        }
        Command::Help => {
            println!("{}", commands::HELP);
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    if let Err(err) = result {
        debug!(error = %err, "intent rejected");
    }
}

async fn selected_key(client: &ConsoleClient) -> Option<ConversationKey> {
    let key = client.selected_window().await.map(|window| window.key);
    if key.is_none() {
        println!("open a conversation first: /open <phone>");
    }
    key
}

async fn list_conversations(client: &ConsoleClient, query: Option<&str>) {
    let conversations = match query {
        Some(query) => client.search(query).await,
        None => client.conversations().await,
    };
    if conversations.is_empty() {
        println!("(no conversations)");
        return;
    }
    for conversation in &conversations {
        let name = client
            .profile(&conversation.key)
            .await
            .and_then(|profile| profile.display_name().map(str::to_string));
        println!(
            "{}",
            render::conversation_line(conversation, name.as_deref())
        );
    }
}

async fn list_recent(client: &ConsoleClient, limit: usize) {
    let messages = client.recent_messages(limit).await;
    if messages.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for message in &messages {
        println!("{}", render::feed_line(message));
    }
}

async fn show_profile(client: &ConsoleClient, key: &ConversationKey) {
    let Some(profile) = client.profile(key).await else {
        println!("(no profile for {})", key.display_label());
        return;
    };
    println!("{}", client.display_name(key).await);
    for line in render::profile_lines(&profile) {
        println!("{line}");
    }
}

/// Prints notifications and any window messages not yet shown.
async fn print_events(
    client: Arc<ConsoleClient>,
    mut events: tokio::sync::broadcast::Receiver<ClientEvent>,
    slot: Arc<Mutex<NotificationSlot>>,
) {
    let mut shown_key: Option<ConversationKey> = None;
    let mut shown: HashSet<Message> = HashSet::new();
    let mut exhausted_reported = false;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "console fell behind client events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            ClientEvent::Notification(notification) => {
                println!("{}", render::notification_line(&notification));
                slot.lock().await.show(notification);
            }
            ClientEvent::WindowUpdated | ClientEvent::ScrollToLatest => {
                let Some(window) = client.selected_window().await else {
                    continue;
                };
                if shown_key.as_ref() != Some(&window.key) {
                    println!("--- {} ---", client.display_name(&window.key).await);
                    shown_key = Some(window.key.clone());
                    shown.clear();
                    exhausted_reported = false;
                }
                for message in &window.messages {
                    if shown.insert(message.clone()) {
                        println!("{}", render::message_line(message));
                    }
                }
                if !window.has_more && !exhausted_reported {
                    println!("  (start of conversation)");
                    exhausted_reported = true;
                }
            }
            ClientEvent::StatusChanged(state) => debug!(?state, "status changed"),
            ClientEvent::ConversationsUpdated => debug!("conversations updated"),
            ClientEvent::ProfileUpdated(key) => debug!(conversation = %key, "profile updated"),
        }
    }
}
