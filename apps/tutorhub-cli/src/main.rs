use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tutorhub_api::{
    AccountId, ClientConfig, Directory, HttpClient, Message, MessageGateway, MessageId,
};
use tutorhub_identity::{IdentityCache, IdentityResolver};
use tutorhub_messaging::{ConversationAggregator, ConversationId, CounterpartyDisplay};
use tutorhub_store::{ContactHintStore, HintStoreConfig};

mod demo;

/// Tutorhub messaging - conversations between students and teachers
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the marketplace API
    #[arg(long, env = "TUTORHUB_API_URL", default_value = "http://localhost:8000/api/v1")]
    api_url: String,

    /// Bearer token for the API
    #[arg(long, env = "TUTORHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Account id to act as
    #[arg(short, long)]
    account: Option<i64>,

    /// SQLite file for contact display hints
    #[arg(long, default_value = "tutorhub-hints.db")]
    hints_db: PathBuf,

    /// Page size for bulk directory requests
    #[arg(long, default_value = "1000")]
    bulk_limit: u32,

    /// Run against a seeded in-memory backend instead of the API
    #[arg(long)]
    demo: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show account to profile mappings
    Mappings,
    /// List conversations, newest first
    Conversations,
    /// Show the thread with a counterparty profile
    Thread { profile_id: i64 },
    /// Send a message to a counterparty profile
    Send {
        profile_id: i64,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Mark a message as read
    Read { message_id: i64 },
    /// Show the total unread count
    Unread,
    /// Delete a message
    Delete { message_id: i64 },
    /// Start a chat with a counterparty found through user search
    StartChat { profile_id: i64, account_id: i64 },
}

impl Command {
    /// Whether the command acts on behalf of a current account
    fn needs_account(&self) -> bool {
        !matches!(
            self,
            Command::Mappings | Command::Unread | Command::Delete { .. }
        )
    }
}

struct Session {
    gateway: Arc<dyn MessageGateway>,
    resolver: Arc<IdentityResolver>,
    aggregator: ConversationAggregator,
    json: bool,
}

impl Session {
    async fn connect(args: &Args) -> Result<Self> {
        let (directory, gateway): (Arc<dyn Directory>, Arc<dyn MessageGateway>) = if args.demo {
            let backend = demo::seeded_backend();
            backend.set_viewer(AccountId(args.account.unwrap_or(demo::DEMO_ACCOUNT)));
            info!("Using seeded in-memory backend");
            (backend.clone() as Arc<dyn Directory>, backend as Arc<dyn MessageGateway>)
        } else {
            let config = ClientConfig {
                base_url: args.api_url.clone(),
                bearer_token: args.token.clone(),
                bulk_limit: args.bulk_limit,
                ..Default::default()
            };
            let client = Arc::new(HttpClient::new(&config).context("Invalid API configuration")?);
            info!(base_url = %client.base_url(), "Using marketplace API");
            (client.clone() as Arc<dyn Directory>, client as Arc<dyn MessageGateway>)
        };

        let resolver = Arc::new(IdentityResolver::new(
            directory,
            Arc::new(IdentityCache::new()),
            args.bulk_limit,
        ));

        let mut aggregator = ConversationAggregator::new(gateway.clone(), resolver.clone());
        let hint_config = HintStoreConfig {
            db_path: args.hints_db.clone(),
        };
        match ContactHintStore::open(&hint_config).await {
            Ok(hints) => aggregator = aggregator.with_hint_store(Arc::new(hints)),
            Err(e) => warn!(
                path = %hint_config.db_path.display(),
                "Contact hints disabled: {:#}",
                e
            ),
        }

        Ok(Self {
            gateway,
            resolver,
            aggregator,
            json: args.json,
        })
    }

    /// Look up the acting account and make it current
    async fn sign_in(&self, account: Option<i64>) -> Result<()> {
        let Some(id) = account else {
            bail!("This command needs --account <id>");
        };

        let account = self
            .resolver
            .get_user_info(AccountId(id))
            .await
            .with_context(|| format!("Unknown account {id}"))?;
        self.aggregator.set_current_account(account);
        Ok(())
    }

    async fn mappings(&self) -> Result<()> {
        if !self.resolver.initialize_user_mappings().await {
            bail!("Failed to load identity mappings");
        }
        let maps = self.resolver.cache().snapshot();

        if self.json {
            let students: Vec<_> = maps
                .student_links()
                .into_iter()
                .map(|(account, student)| json!({ "user_id": account, "student_id": student }))
                .collect();
            let teachers: Vec<_> = maps
                .teacher_links()
                .into_iter()
                .map(|(account, teacher)| json!({ "user_id": account, "teacher_id": teacher }))
                .collect();
            let value = json!({ "students": students, "teachers": teachers });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        println!("Students ({}):", maps.student_count());
        for (account, student) in maps.student_links() {
            let name = maps.account(account).map(|a| a.username.as_str()).unwrap_or("?");
            println!("  account {account} ⇄ student {student}  {name}");
        }
        println!("Teachers ({}):", maps.teacher_count());
        for (account, teacher) in maps.teacher_links() {
            let name = maps.account(account).map(|a| a.username.as_str()).unwrap_or("?");
            println!("  account {account} ⇄ teacher {teacher}  {name}");
        }
        Ok(())
    }

    async fn conversations(&self) -> Result<()> {
        self.aggregator.load_conversations().await?;

        let mut rows = Vec::new();
        for (id, conversation) in self.aggregator.conversation_list() {
            let display = self.aggregator.counterparty_display(id).await;
            rows.push((id, display, conversation));
        }

        if self.json {
            let value: Vec<_> = rows
                .iter()
                .map(|(id, display, conversation)| {
                    json!({
                        "id": id.to_string(),
                        "counterparty": display,
                        "unread_count": conversation.unread_count,
                        "last_message": conversation.last_message,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        if rows.is_empty() {
            println!("No conversations");
        }
        for (id, display, conversation) in rows {
            let preview = conversation
                .last_message
                .as_ref()
                .map(|m| m.content.as_str())
                .unwrap_or("");
            println!(
                "{:<12} {:<16} {:>3} unread  {}",
                id.to_string(),
                display.name,
                conversation.unread_count,
                preview
            );
        }
        Ok(())
    }

    async fn thread(&self, profile_id: i64) -> Result<()> {
        let conversation = self.aggregator.get_conversation(profile_id).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&conversation)?);
            return Ok(());
        }

        let Some(me) = self.aggregator.current_account() else {
            bail!("Not signed in");
        };
        if conversation.messages.is_empty() {
            println!("No messages yet");
            return Ok(());
        }

        let id = ConversationId::with_counterparty(me.role, profile_id);
        let display = self.aggregator.counterparty_display(id).await;

        println!("Conversation with {} ({id})", display.name);
        for message in &conversation.messages {
            print_message(message, me.id, &display);
        }
        Ok(())
    }

    async fn send(&self, profile_id: i64, text: &str) -> Result<()> {
        let message = self.aggregator.send_message(profile_id, text).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&message)?);
        } else {
            println!("Sent message {}", message.id);
        }
        Ok(())
    }

    async fn read(&self, message_id: i64) -> Result<()> {
        self.aggregator
            .mark_message_as_read(MessageId(message_id))
            .await?;
        println!("Marked message {message_id} as read");
        Ok(())
    }

    async fn unread(&self) -> Result<()> {
        let total = self.aggregator.get_unread_message_count().await;
        if self.json {
            println!("{}", json!({ "total": total }));
        } else {
            println!("{total} unread");
        }
        Ok(())
    }

    async fn delete(&self, message_id: i64) -> Result<()> {
        self.gateway
            .delete_message(MessageId(message_id))
            .await
            .with_context(|| format!("Failed to delete message {message_id}"))?;
        println!("Deleted message {message_id}");
        Ok(())
    }

    async fn start_chat(&self, profile_id: i64, account_id: i64) -> Result<()> {
        let counterparty = self
            .resolver
            .get_user_info(AccountId(account_id))
            .await
            .with_context(|| format!("Unknown account {account_id}"))?;

        let id = self.aggregator.start_chat(profile_id, &counterparty).await?;
        let display = self.aggregator.counterparty_display(id).await;

        if self.json {
            println!("{}", json!({ "id": id.to_string(), "counterparty": display }));
        } else {
            println!("Chat ready: {id} with {}", display.name);
        }
        Ok(())
    }
}

fn print_message(message: &Message, me: AccountId, counterparty: &CounterpartyDisplay) {
    let from = if message.sender_id == me {
        "you"
    } else {
        counterparty.name.as_str()
    };
    let marker = if message.is_unread_for(me) { "*" } else { " " };

    println!(
        "{} [{}] #{} {}: {}",
        marker,
        message.sent_at.format("%Y-%m-%d %H:%M"),
        message.id,
        from,
        message.content
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();
    let session = Session::connect(&args).await?;

    let account = if args.demo {
        Some(args.account.unwrap_or(demo::DEMO_ACCOUNT))
    } else {
        args.account
    };

    if args.command.needs_account() {
        session.sign_in(account).await?;
    }

    match &args.command {
        Command::Mappings => session.mappings().await,
        Command::Conversations => session.conversations().await,
        Command::Thread { profile_id } => session.thread(*profile_id).await,
        Command::Send { profile_id, text } => session.send(*profile_id, &text.join(" ")).await,
        Command::Read { message_id } => session.read(*message_id).await,
        Command::Unread => session.unread().await,
        Command::Delete { message_id } => session.delete(*message_id).await,
        Command::StartChat {
            profile_id,
            account_id,
        } => session.start_chat(*profile_id, *account_id).await,
    }
}
