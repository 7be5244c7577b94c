// ============================================================================
// menta: terminal host for the landing page widgets
// ============================================================================
// Usage:
//   menta chat                      Scripted FAQ/booking chat on stdin
//   menta call [--simulate]         Mount the voice widget (Vapi + Supabase);
//                                   MENTA_SERVER_EVENTS_ADDR also receives
//                                   Vapi server messages over HTTP
//   menta listen [--channel NAME]   Print realtime `call-created` broadcasts
//   menta dates [--from DATE]       List bookable consultation dates
// ============================================================================

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use menta_core::call_client::{call_event_channel, parse_server_message};
use menta_core::chat::{available_dates, BookingField, ChatView, ScriptedChat, TIME_SLOTS};
use menta_core::realtime::realtime_event_channel;
use menta_core::{
    CallEvent, CallHost, CallId, FormField, FormFields, Notice, RealtimeEvent, ServerEventListener,
    ServiceConfig, SimulatedCallClient, SimulatedCallScript, SupabaseRealtime, VapiCallClient, VoiceWidget,
    WidgetConfig, WidgetDeps, WidgetError, WidgetHandle,
};

/// Landing page widgets in the terminal
#[derive(Parser)]
#[command(name = "menta", version, about = "Run the Menta chat and voice widgets from a terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the scripted support chat
    Chat,

    /// Mount the voice call widget
    Call {
        /// Use the offline call client instead of Vapi/Supabase
        #[arg(long)]
        simulate: bool,
    },

    /// Print realtime broadcasts on a channel
    Listen {
        /// Channel name (default: MENTA_CHANNEL or "calls")
        #[arg(long)]
        channel: Option<String>,
    },

    /// List the dates offered by the booking form
    Dates {
        /// Reference day as YYYY-MM-DD (default: today)
        #[arg(long)]
        from: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("menta=debug".parse()?)
                .add_directive("menta_core=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat => cmd_chat().await,
        Commands::Call { simulate } => cmd_call(simulate).await,
        Commands::Listen { channel } => cmd_listen(channel).await,
        Commands::Dates { from } => {
            cmd_dates(from.unwrap_or_else(|| Local::now().date_naive()));
            Ok(())
        }
    }
}

// ============================================================================
// Chat
// ============================================================================

async fn cmd_chat() -> Result<()> {
    let mut chat = ScriptedChat::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_message(&chat.messages()[0].text, "support", &chat.messages()[0].timestamp);
    println!("Suggestions:");
    for (i, phrase) in chat.quick_replies().iter().enumerate() {
        println!("  {}. {}", i + 1, phrase);
    }
    println!("(type a number to pick a suggestion, or 'quit')");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line == "quit" {
            break;
        }

        match chat.view() {
            ChatView::Chat => {
                let text = line
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| chat.quick_replies().get(i).copied())
                    .map(String::from)
                    .unwrap_or(line);
                if text.is_empty() {
                    continue;
                }

                println!("support is typing...");
                if let Some(reply) = chat.send_message(&text).await {
                    print_message(&reply.text, "support", &reply.timestamp);
                }
                if chat.view() == ChatView::Booking {
                    print_booking_help(&chat);
                }
            }
            ChatView::Booking => booking_command(&mut chat, &line),
        }
    }

    Ok(())
}

fn booking_command(chat: &mut ScriptedChat, line: &str) {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let outcome = match command {
        "date" => chat.select_date(rest),
        "time" => chat.select_time(rest),
        "set" => match rest.split_once(' ') {
            Some((field, value)) => field
                .parse::<BookingField>()
                .map(|field| chat.set_booking_field(field, value.trim())),
            None => {
                println!("usage: set <field> <value>");
                Ok(())
            }
        },
        "submit" => chat.submit_booking().map(|_| {
            if let Some(confirmation) = chat.messages().last() {
                print_message(&confirmation.text, "support", &confirmation.timestamp);
            }
        }),
        "back" => {
            chat.back_to_chat();
            println!("Back to chat.");
            Ok(())
        }
        _ => {
            print_booking_help(chat);
            Ok(())
        }
    };

    if let Err(e) = outcome {
        println!("! {}", e);
    }
}

fn print_booking_help(chat: &ScriptedChat) {
    println!("=== Book a free consultation ===");
    for date in chat.available_dates() {
        println!("  {}  {}", date.iso(), date.display);
    }
    println!("Times: {}", TIME_SLOTS.join(" "));
    let fields: Vec<&str> = BookingField::ALL.iter().map(|f| f.label()).collect();
    println!("Fields: {}", fields.join(", "));
    println!("Commands: date <YYYY-MM-DD> | time <HH:MM> | set <field> <value> | submit | back");
}

fn print_message(text: &str, who: &str, timestamp: &str) {
    println!("[{}] {}: {}", timestamp, who, text);
}

// ============================================================================
// Voice call
// ============================================================================

/// Host that renders widget callbacks on stdout
struct TerminalHost;

impl CallHost for TerminalHost {
    fn on_call_start(&self, call_id: &CallId) {
        println!("* call started ({})", call_id);
    }

    fn on_call_end(&self) {
        println!("* call ended");
    }

    fn on_error(&self, error: &WidgetError) {
        if error.is_retryable() {
            println!("! {} (try again)", error);
        } else {
            println!("! {}", error);
        }
    }

    fn on_notice(&self, notice: &Notice) {
        println!("* {}", notice.message());
    }

    fn on_form_opened(&self, title: &str, fields: &FormFields) {
        let required: Vec<String> = fields
            .required()
            .map(|f| format!("{} [{}]", f, f.label()))
            .collect();
        println!("=== {} ===", title);
        println!("Fill in: {} (set <field> <value>, then submit)", required.join(", "));
    }
}

async fn cmd_call(simulate: bool) -> Result<()> {
    let config = WidgetConfig::from_env().map_err(|e| anyhow!("{}", e))?;
    let host = Arc::new(TerminalHost);

    let (call_tx, call_rx) = call_event_channel();
    let (rt_tx, rt_rx) = realtime_event_channel();
    // Vapi server messages pasted on stdin are forwarded here
    let injector = call_tx.clone();
    let mut subscription = None;
    let mut server_events = None;

    let loader = async {
        let call_client: Arc<dyn menta_core::CallClient> = if simulate {
            let script = SimulatedCallScript::default();
            Arc::new(SimulatedCallClient::new(script, call_tx).with_broadcast(rt_tx))
        } else {
            let services = ServiceConfig::from_env().map_err(|e| anyhow!("{}", e))?;
            let realtime = SupabaseRealtime::new(
                &services.supabase_url,
                &services.supabase_anon_key,
                &config.channel,
            )?;
            subscription = Some(realtime.subscribe(rt_tx).await?);
            if let Some(addr) = &services.server_events_addr {
                server_events = Some(ServerEventListener::bind(addr, call_tx.clone()).await?);
            }

            let mut client = VapiCallClient::new(&services.vapi_api_url, services.vapi_api_key, call_tx);
            if let Some(url) = services.vapi_server_url {
                client = client.with_server_url(url);
            }
            Arc::new(client)
        };

        Ok::<_, anyhow::Error>(WidgetDeps {
            call_client,
            call_events: call_rx,
            realtime_events: rt_rx,
            submitter: None,
        })
    };

    let widget = VoiceWidget::mount(config.clone(), host, loader).await;
    info!("Widget {} mounted", widget.mount_id());
    let (handle, task) = widget.spawn();

    println!("Commands: toggle | set <name|phone|email> <value> | submit | dismiss | status | event <json> | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "quit" {
            break;
        }
        if let Err(e) = call_command(&handle, &injector, line).await {
            println!("! {}", e);
        }
    }

    handle.shutdown().await;
    let controller = task.await?;
    info!("Final call status: {:?}", controller.status());

    if let Some(subscription) = subscription {
        subscription.shutdown().await;
    }
    if let Some(listener) = server_events {
        listener.shutdown().await;
    }
    Ok(())
}

async fn call_command(handle: &WidgetHandle, injector: &mpsc::Sender<CallEvent>, line: &str) -> Result<()> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "toggle" => {
            let action = handle.toggle().await?;
            println!("* {:?}", action);
        }
        "set" => {
            let (field, value) = rest
                .split_once(' ')
                .ok_or_else(|| anyhow!("usage: set <field> <value>"))?;
            let field: FormField = field.parse().map_err(|e: String| anyhow!(e))?;
            handle.set_field(field, value.trim()).await?;
        }
        "submit" => handle.submit().await?,
        "dismiss" => handle.dismiss().await,
        "status" => {
            let snapshot = handle.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        "event" => {
            let value: serde_json::Value = serde_json::from_str(rest)?;
            match parse_server_message(&value) {
                Some(event) => injector
                    .send(event)
                    .await
                    .map_err(|_| anyhow!("widget no longer receives call events"))?,
                None => println!("(ignored)"),
            }
        }
        "" => {}
        other => println!("Unknown command '{}'", other),
    }
    Ok(())
}

// ============================================================================
// Realtime listener
// ============================================================================

async fn cmd_listen(channel: Option<String>) -> Result<()> {
    let services = ServiceConfig::from_env().map_err(|e| anyhow!("{}", e))?;
    let channel = channel
        .or_else(|| std::env::var("MENTA_CHANNEL").ok())
        .unwrap_or_else(|| WidgetConfig::default().channel);

    let (tx, mut rx) = realtime_event_channel();
    let realtime = SupabaseRealtime::new(&services.supabase_url, &services.supabase_anon_key, &channel)?;
    let subscription = realtime.subscribe(tx).await?;
    println!("Listening on {} (Ctrl-C to stop)", channel);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = rx.recv() => match event {
                Some(RealtimeEvent::Subscribed) => println!("* subscribed"),
                Some(RealtimeEvent::CallCreated { call_id }) => println!("call-created {}", call_id),
                Some(RealtimeEvent::Closed { reason }) => {
                    warn!("Realtime channel closed: {}", reason);
                    break;
                }
                None => break,
            }
        }
    }

    subscription.shutdown().await;
    Ok(())
}

// ============================================================================
// Dates
// ============================================================================

fn cmd_dates(today: NaiveDate) {
    println!("=== Consultation dates after {} ===", today);
    for date in available_dates(today) {
        println!("  {}  {}", date.iso(), date.display);
    }
    println!("Times: {}", TIME_SLOTS.join(" "));
}
