//! Interactive console client
//!
//! Reads lines from stdin: `/commands` manage rooms, anything else is posted
//! to the current room. A background task polls the current room once per
//! `poll_interval` and prints whatever arrived since its last cursor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{ChatClient, ChatClientConfig};
use crate::error::{ChatError, Result};
use crate::{DEFAULT_ROOM, Message};

/// Shortest delay between two polls; a zero interval would spin
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

const USAGE: &str = "\
Commands:
  /join <room>    join a room and make it current
  /leave [room]   leave a room (default: the current one)
  /rooms          list every room
  /help           show this help
  /quit           exit
Anything else is sent to the current room.";

/// Console client configuration
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub client: ChatClientConfig,
    /// Room joined on startup; it cannot be left
    pub default_room: String,
    /// Delay between two polls of the current room
    pub poll_interval: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            client: ChatClientConfig::default(),
            default_room: DEFAULT_ROOM.to_string(),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(String),
    Leave(Option<String>),
    Rooms,
    Help,
    Quit,
    /// Plain text for the current room
    Say(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Say(line.to_string())));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(ChatError::invalid_message(format!(
                "Too many arguments for /{}",
                name
            )));
        }

        let command = match (name, arg) {
            ("join", Some(room)) => Command::Join(room),
            ("join", None) => return Err(ChatError::invalid_message("Usage: /join <room>")),
            ("leave", room) => Command::Leave(room),
            ("rooms", None) => Command::Rooms,
            ("help", None) => Command::Help,
            ("quit", None) => Command::Quit,
            ("rooms" | "help" | "quit", Some(_)) => {
                return Err(ChatError::invalid_message(format!(
                    "/{} takes no arguments",
                    name
                )));
            }
            _ => {
                return Err(ChatError::invalid_message(format!(
                    "Unknown command: /{}",
                    name
                )));
            }
        };
        Ok(Some(command))
    }
}

/// Render a message as `[HH:MM] user: text` in local time
pub fn format_message(message: &Message) -> String {
    let time = i64::try_from(message.timestamp)
        .ok()
        .and_then(|millis| Local.timestamp_millis_opt(millis).single())
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());

    format!("[{}] {}: {}", time, message.username, message.text)
}

/// Room state of one connected console user.
///
/// Holds the connection and the current room; every command goes through
/// [`Session::execute`], which is all the stdin loop does besides parsing.
pub struct Session {
    client: Arc<ChatClient>,
    default_room: String,
    room_tx: watch::Sender<String>,
}

impl Session {
    /// Join `default_room` on a connected client and make it current
    pub async fn start(client: ChatClient, default_room: impl Into<String>) -> Result<Self> {
        let default_room = default_room.into();
        let reply = client.join_room(&default_room).await?;
        println!("{} ({} users)", reply.message, reply.user_count);

        let (room_tx, _) = watch::channel(default_room.clone());
        Ok(Self {
            client: Arc::new(client),
            default_room,
            room_tx,
        })
    }

    /// Room that plain text goes to and the poller watches
    pub fn current_room(&self) -> String {
        self.room_tx.borrow().clone()
    }

    pub fn client(&self) -> Arc<ChatClient> {
        Arc::clone(&self.client)
    }

    /// Follow current room changes
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.room_tx.subscribe()
    }

    /// Run one command.
    ///
    /// Leaving the default room is refused with [`ChatError::InvalidMessage`];
    /// leaving the current room makes the default room current again.
    pub async fn execute(&self, command: Command) -> Result<()> {
        let current = self.current_room();

        match command {
            Command::Say(text) => {
                if !self.client.send_message(&current, &text).await? {
                    println!("Message was not delivered");
                }
            }

            Command::Join(room) => {
                let reply = self.client.join_room(&room).await?;
                println!("{} ({} users)", reply.message, reply.user_count);
                self.room_tx.send_replace(room);
            }

            Command::Leave(room) => {
                let room = room.unwrap_or_else(|| current.clone());
                if room == self.default_room {
                    return Err(ChatError::invalid_message(format!(
                        "You cannot leave {}",
                        room
                    )));
                }

                let reply = self.client.leave_room(&room).await?;
                println!("{} ({} users left)", reply.message, reply.remaining_users);
                if room == current {
                    self.room_tx.send_replace(self.default_room.clone());
                    println!("Now in {}", self.default_room);
                }
            }

            Command::Rooms => {
                for info in self.client.list_rooms().await? {
                    let marker = if info.room_name == current { "*" } else { " " };
                    println!("{} {}", marker, info.room_name);
                }
            }

            Command::Help => println!("{}", USAGE),
            Command::Quit => {}
        }
        Ok(())
    }

    /// Close the connection once no poller holds the client any more
    pub async fn close(self) -> Result<()> {
        if let Ok(mut client) = Arc::try_unwrap(self.client) {
            client.disconnect().await?;
        }
        Ok(())
    }
}

/// Interactive chat session over stdin/stdout
pub struct Console {
    config: ConsoleConfig,
}

impl Console {
    pub fn new(config: ConsoleConfig) -> Self {
        Self { config }
    }

    /// Run until `/quit` or end of input
    pub async fn run(self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let Some(username) = prompt_username(&mut lines).await? else {
            return Ok(());
        };

        let mut client = ChatClient::new(self.config.client.clone());
        client.connect(username.as_str()).await?;

        let session = Session::start(client, self.config.default_room.clone()).await?;
        println!("Type /help for commands");

        let poller = spawn_poller(
            session.client(),
            session.subscribe(),
            self.config.poll_interval,
        );

        let result = read_loop(&session, &mut lines).await;

        poller.abort();
        let _ = poller.await;

        session.close().await?;
        result
    }
}

async fn read_loop(session: &Session, lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e.message());
                println!("{}", USAGE);
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        if let Err(e) = session.execute(command).await {
            if e.is_fatal() {
                return Err(e);
            }
            println!("{}", e.message());
        }
    }
    Ok(())
}

async fn prompt_username(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"Enter your username: ").await?;
        stdout.flush().await?;

        match lines.next_line().await? {
            Some(line) if !line.trim().is_empty() => return Ok(Some(line.trim().to_string())),
            Some(_) => println!("Username cannot be empty"),
            None => return Ok(None),
        }
    }
}

/// Poll the current room and print new messages.
///
/// Cursors are kept per room so switching back to a room only shows what
/// arrived while away.
fn spawn_poller(
    client: Arc<ChatClient>,
    room_rx: watch::Receiver<String>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cursors: HashMap<String, i64> = HashMap::new();
        let mut ticker = tokio::time::interval(poll_interval.max(MIN_POLL_INTERVAL));

        loop {
            ticker.tick().await;
            let room = room_rx.borrow().clone();
            let cursor = cursors.entry(room.clone()).or_insert(0);

            match client.receive_messages(&room, *cursor).await {
                Ok(messages) => {
                    for message in &messages {
                        println!("{}", format_message(message));
                    }
                    *cursor += messages.len() as i64;
                    if !messages.is_empty() {
                        debug!("{} new messages in {}", messages.len(), room);
                    }
                }
                Err(e) if e.is_fatal() => {
                    warn!("Stopped polling: {}", e);
                    break;
                }
                Err(e) => warn!("Failed to receive messages: {}", e),
            }
        }
    })
}
