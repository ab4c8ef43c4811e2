//! herald: command-line client for status banners.
//!
//! Runs the same BannerCenter a UI would, against the banner service socket.
//!
//! ## Subcommands
//!
//! - `watch`: stay active and print the banner list whenever it changes
//! - `list`: one refresh, print, exit
//! - `dismiss` / `undismiss`: edit dismissal state
//! - `end-session`: forget the current session's dismissals
//! - `status`: service reachability and dismissed ids per tier

mod checks;
mod logging;
mod render;
mod watch;

use clap::{Parser, Subcommand};
use herald_core::{
    discard_session_scope, load_config_with_storage, BannerCenter, BannerSource, DismissalStore,
    HeraldConfig, SocketBannerClient, StorageConfig, Tier,
};
use std::env;
use std::sync::Arc;

const SESSION_ENV: &str = "HERALD_SESSION_ID";

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Status banners from local checks and the banner service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print banners on every change until interrupted (SIGHUP forces a refresh)
    Watch {
        /// Print each snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch banners once and print them
    List {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Hide a banner by id
    Dismiss {
        #[arg(value_name = "ID")]
        id: String,

        /// Keep it hidden across sessions
        #[arg(long)]
        permanent: bool,
    },

    /// Restore every dismissed banner (both tiers)
    Undismiss,

    /// Forget this session's dismissals (HERALD_SESSION_ID) and remove its storage
    EndSession,

    /// Show service reachability and dismissed ids
    Status,
}

struct Context {
    storage: StorageConfig,
    config: HeraldConfig,
    session_id: Option<String>,
}

impl Context {
    fn load(storage: StorageConfig) -> Self {
        let config = load_config_with_storage(&storage);
        let session_id = env::var(SESSION_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self {
            storage,
            config,
            session_id,
        }
    }

    fn client(&self) -> SocketBannerClient {
        SocketBannerClient::from_config(&self.storage, &self.config)
    }

    fn dismissals(&self) -> DismissalStore {
        DismissalStore::with_storage(&self.storage, self.session_id.as_deref())
    }

    fn center(&self, config: &HeraldConfig) -> BannerCenter {
        let client = self.client();
        let local = checks::socket_check(client.socket_path().to_path_buf());
        let source: Arc<dyn BannerSource> = Arc::new(client);
        BannerCenter::new(source, self.dismissals(), Box::new(local), config)
    }
}

fn main() {
    let storage = StorageConfig::default();
    let _logging_guard = logging::init(&storage);
    let cli = Cli::parse();
    let context = Context::load(storage);

    let result = match cli.command {
        Commands::Watch { json } => runtime().and_then(|rt| {
            let center = context.center(&context.config);
            rt.block_on(watch::run(center, json))
        }),
        Commands::List { json } => runtime().and_then(|rt| rt.block_on(list(&context, json))),
        Commands::Dismiss { id, permanent } => dismiss(&context, &id, permanent),
        Commands::Undismiss => {
            context.dismissals().undismiss_all();
            println!("Restored all dismissed banners.");
            Ok(())
        }
        Commands::EndSession => end_session(&context),
        Commands::Status => runtime().and_then(|rt| rt.block_on(status(&context))),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "herald failed");
        std::process::exit(1);
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {}", e))
}

async fn list(context: &Context, json: bool) -> Result<(), String> {
    let config = HeraldConfig {
        stream_enabled: false,
        ..context.config.clone()
    };
    let mut center = context.center(&config);
    center.activate().await;
    while center.pump().await {}
    let snapshot = center.snapshot();
    center.deactivate();
    render::print_snapshot(&snapshot, json)
}

fn dismiss(context: &Context, id: &str, permanent: bool) -> Result<(), String> {
    if !permanent && context.session_id.is_none() {
        return Err(format!(
            "no session to dismiss into; set {} or pass --permanent",
            SESSION_ENV
        ));
    }
    context.dismissals().dismiss(id, permanent);
    let tier = if permanent { "permanently" } else { "for this session" };
    println!("Dismissed {} {}.", id, tier);
    Ok(())
}

fn end_session(context: &Context) -> Result<(), String> {
    let Some(session_id) = context.session_id.as_deref() else {
        return Err(format!("no session to end; set {}", SESSION_ENV));
    };
    context.dismissals().end_session();
    discard_session_scope(&context.storage, session_id)
        .map_err(|e| format!("Failed to remove session storage: {}", e))?;
    println!("Ended session {}; its dismissals are forgotten.", session_id);
    Ok(())
}

async fn status(context: &Context) -> Result<(), String> {
    let client = context.client();
    println!("Socket:  {}", client.socket_path().display());
    match client.health().await {
        Ok(data) => println!("Service: up {}", data),
        Err(err) => println!("Service: unavailable ({})", err),
    }
    println!(
        "Session: {}",
        context.session_id.as_deref().unwrap_or("(none; session tier is in-memory)")
    );

    let dismissals = context.dismissals();
    for (label, tier) in [("Session", Tier::Session), ("Permanent", Tier::Permanent)] {
        let ids = dismissals.tier_ids(tier);
        if ids.is_empty() {
            println!("{} dismissals: none", label);
        } else {
            println!("{} dismissals: {}", label, ids.join(", "));
        }
    }
    Ok(())
}
