mod context;

use {
    anyhow::Context as _,
    clap::{Parser, Subcommand, ValueEnum},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    propwire_gateway::{EVENT_MESSAGE_SENT, MessageEnvelope, types},
    propwire_realtime::{Channel, EventHandlers},
};

use context::AppContext;

#[derive(Parser)]
#[command(name = "propwire", about = "Propwire — property agent client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the local session.
    Logout,
    /// Show the current agent profile.
    User,
    /// List property listings.
    Properties,
    /// Show one listing.
    Property { id: u64 },
    /// Send an inquiry about a listing.
    Inquire {
        property_id: u64,
        #[arg(short, long)]
        message: String,
    },
    /// List inquiries.
    Inquiries,
    /// Accept, decline, or cancel an inquiry.
    Inquiry { action: InquiryActionArg, id: u64 },
    /// Chat channels.
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InquiryActionArg {
    Accept,
    Decline,
    Cancel,
}

impl From<InquiryActionArg> for types::InquiryAction {
    fn from(arg: InquiryActionArg) -> Self {
        match arg {
            InquiryActionArg::Accept => Self::Accept,
            InquiryActionArg::Decline => Self::Decline,
            InquiryActionArg::Cancel => Self::Cancel,
        }
    }
}

#[derive(Subcommand)]
enum ChatAction {
    /// List conversations.
    List,
    /// Show one conversation's history.
    Show { id: u64 },
    /// Send a message.
    Send {
        id: u64,
        #[arg(short, long)]
        message: String,
    },
    /// Follow a conversation live until ctrl-c.
    Watch { id: u64 },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let ctx = AppContext::init().context("failed to initialize")?;

    let result = run(&cli, &ctx).await;
    ctx.shutdown().await;

    if let Some(api_err) = result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<propwire_common::ApiError>())
    {
        if api_err.requires_login() {
            eprintln!("session expired — run `propwire login`");
        }
    }
    result
}

async fn run(cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Login { email, password } => {
            ctx.api.login(email, password).await?;
            println!("logged in as {email}");
            Ok(())
        },
        Commands::Logout => {
            ctx.api.logout()?;
            println!("logged out");
            Ok(())
        },
        Commands::User => print_json(&ctx.api.current_user().await?),
        Commands::Properties => print_json(&ctx.api.properties().await?),
        Commands::Property { id } => print_json(&ctx.api.property(*id).await?),
        Commands::Inquire {
            property_id,
            message,
        } => {
            ctx.api.inquire(*property_id, message).await?;
            println!("inquiry sent");
            Ok(())
        },
        Commands::Inquiries => print_json(&ctx.api.inquiries().await?),
        Commands::Inquiry { action, id } => {
            ctx.api.inquiry_action(*id, (*action).into()).await?;
            println!("done");
            Ok(())
        },
        Commands::Chat { action } => run_chat(action, ctx).await,
    }
}

async fn run_chat(action: &ChatAction, ctx: &AppContext) -> anyhow::Result<()> {
    match action {
        ChatAction::List => print_json(&ctx.api.chat_channels().await?),
        ChatAction::Show { id } => print_json(&ctx.api.chat_channel(*id).await?),
        ChatAction::Send { id, message } => {
            ctx.api.send_message(*id, message).await?;
            println!("sent");
            Ok(())
        },
        ChatAction::Watch { id } => watch_channel(*id, ctx).await,
    }
}

/// Subscribe to a conversation's private channel and print incoming
/// messages until ctrl-c, then unbind.
async fn watch_channel(id: u64, ctx: &AppContext) -> anyhow::Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handlers = EventHandlers::new().on(EVENT_MESSAGE_SENT, move |payload| {
        let _ = tx.send(payload);
    });

    let subscription = ctx
        .realtime
        .subscribe(Channel::private(format!("chat.{id}")), handlers)
        .await?;
    info!(channel = %subscription.channel().name(), "watching");
    println!("watching chat.{id} — ctrl-c to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            payload = rx.recv() => {
                let Some(payload) = payload else { break };
                match serde_json::from_value::<MessageEnvelope>(payload.clone()) {
                    Ok(envelope) => {
                        let sender = envelope
                            .message
                            .sender
                            .map(|s| s.name)
                            .unwrap_or_else(|| "?".into());
                        println!("{sender}: {}", envelope.message.message);
                    },
                    Err(_) => println!("{payload}"),
                }
            },
        }
    }

    subscription.unsubscribe().await?;
    Ok(())
}
