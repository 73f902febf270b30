use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tracing::info;

use portal_client::state::{Feed, ScrollIntent, SidebarEntry};
use portal_client::{ClientConfig, ClientView, ConversationClient, HttpApi};

/// Terminal client for portal direct messages.
#[derive(Parser, Debug)]
#[command(name = "portal-chat", version)]
struct Args {
    /// Base URL of the messaging server.
    #[arg(long, env = "PORTAL_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// Session token issued for the signed-in user.
    #[arg(long, env = "PORTAL_TOKEN")]
    token: String,

    #[arg(long, default_value_t = 2500)]
    poll_ms: u64,

    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

const HELP: &str = "\
commands:
  /users [filter]   filter the user list as you type
  /search [filter]  search the user list now
  /open <user id>   open a conversation
  /menu <msg id>    toggle the action menu on one of your messages
  /close            close the action menu
  /edit <msg id>    edit one of your messages
  /draft <text>     replace the edit draft
  /save             save the edit
  /cancel           abandon the edit
  /unsend <msg id>  unsend one of your messages
  /quit
anything else is sent to the open conversation";

/// Stdout renderer. Stdin lines arrive on a channel so a confirmation
/// prompt can take the next line while a command is running.
struct Terminal {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Terminal {
    async fn next_line(&self) -> Option<String> {
        self.lines.lock().await.recv().await
    }
}

#[async_trait]
impl ClientView for Terminal {
    async fn confirm(&self, prompt: &str) -> bool {
        println!("{} [y/N]", prompt);
        matches!(
            self.next_line().await.as_deref().map(str::trim),
            Some("y") | Some("Y") | Some("yes")
        )
    }

    fn alert(&self, message: &str) {
        println!("! {}", message);
    }

    fn feed_changed(&self, feed: &Feed, scroll: ScrollIntent) {
        if scroll == ScrollIntent::Preserve {
            println!("-- conversation updated --");
        }
        if let Some(hint) = &feed.hint {
            println!("  ({})", hint);
            return;
        }
        for item in &feed.items {
            let at = item.sent_at.with_timezone(&chrono::Local).format("%H:%M");
            let handle = if item.has_actions() {
                format!(" #{}", item.message_id)
            } else {
                String::new()
            };
            let who = if item.mine { "you" } else { item.sender_name.as_str() };
            if item.unsent {
                println!("[{}] {}: <{}>", at, who, item.text);
            } else {
                println!("[{}] {}{}: {}", at, who, handle, item.text);
            }
        }
    }

    fn sidebar_changed(&self, entries: &[SidebarEntry], hint: Option<&str>) {
        if let Some(hint) = hint {
            println!("users: ({})", hint);
            return;
        }
        let names: Vec<String> = entries
            .iter()
            .map(|e| {
                let mark = if e.active { "*" } else { "" };
                format!("{}{}={}", mark, e.user_id, e.username)
            })
            .collect();
        println!("users: {}", names.join("  "));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_chat=info,portal_client=warn".into()),
        )
        .init();

    let args = Args::parse();

    let api = HttpApi::new(&args.server, args.token, Duration::from_secs(args.timeout_secs))?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let terminal = Arc::new(Terminal {
        lines: Mutex::new(rx),
    });
    let config = ClientConfig {
        poll_interval: Duration::from_millis(args.poll_ms),
        ..ClientConfig::default()
    };
    let client = ConversationClient::new(Arc::new(api), terminal.clone(), config);

    info!("Connecting to {}", args.server);
    println!("{}", HELP);
    client.load_users("").await;
    if let Some(me) = client.inspect(|s| s.me).await {
        println!("signed in as user {}", me);
    }

    while let Some(line) = terminal.next_line().await {
        if !run_command(&client, line.trim()).await {
            break;
        }
    }

    client.shutdown().await;
    Ok(())
}

/// Returns false once the user asks to quit.
async fn run_command(client: &ConversationClient, line: &str) -> bool {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let id = rest.parse::<i64>().ok();

    match (command, id) {
        ("/quit", _) => return false,
        ("/help", _) => println!("{}", HELP),
        ("/users", _) => client.filter_input(rest).await,
        ("/search", _) => client.load_users(rest).await,
        ("/open", Some(user_id)) => {
            let username = client
                .inspect(|s| {
                    s.sidebar
                        .iter()
                        .find(|e| e.user_id == user_id)
                        .map(|e| e.username.clone())
                })
                .await;
            match username {
                Some(username) => client.select_user(user_id, &username).await,
                None => println!("! no such user in the list"),
            }
        }
        ("/menu", Some(message_id)) => {
            if client.toggle_menu(message_id).await {
                println!("#{}: /edit {} or /unsend {}", message_id, message_id, message_id);
            }
        }
        ("/close", _) => client.close_menus().await,
        ("/edit", Some(message_id)) => {
            if client.start_edit(message_id).await {
                println!("editing #{}; /draft <text>, then /save or /cancel", message_id);
            } else {
                println!("! you can only edit your own messages");
            }
        }
        ("/draft", _) => client.update_draft(rest).await,
        ("/save", _) => client.confirm_edit().await,
        ("/cancel", _) => client.cancel_edit().await,
        ("/unsend", Some(message_id)) => client.unsend(message_id).await,
        ("", _) => {}
        (c, _) if c.starts_with('/') => println!("! unknown or incomplete command; /help"),
        _ => {
            if client.inspect(|s| s.selected.is_none()).await {
                println!("! open a conversation first (/open <user id>)");
            } else {
                client.send(line).await;
            }
        }
    }
    true
}
