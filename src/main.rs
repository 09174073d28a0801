//! Directory Push CLI - exercise the notification bootstrap headlessly.
//!
//! Runs the real adapter, bootstrapper and router against the simulated push
//! platform, so payloads and session flows can be checked without a device.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use directory_push::adapter::simulated::{RecordingNotifier, SimulatedPush};
use directory_push::adapter::{
    BrowserAdapter, BrowserMessaging, BrowserOptions, LocalNotifier, NativeAdapter,
    NativePushBridge, NotificationAdapter, Platform,
};
use directory_push::config::PlatformChoice;
use directory_push::firestore::FirestoreStore;
use directory_push::i18n::Catalog;
use directory_push::router::normalize;
use directory_push::session::BootstrapOutcome;
use directory_push::store::{MemoryStore, NotificationLog, ProfileStore};
use directory_push::toast::{RecordingToasts, ToastSink};
use directory_push::{
    AuthUser, Config, CurrentUser, ForegroundRouter, PermissionStatus, PushPayload,
    SessionBootstrapper,
};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "directory-push")]
#[command(about = "Push notification bootstrap for the directory app", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized notification for a push payload JSON file
    Normalize {
        /// Path to the payload JSON
        file: PathBuf,
    },
    /// Run one session bootstrap against the simulated platform
    Bootstrap(BootstrapArgs),
    /// Show effective configuration
    Config,
}

#[derive(Args)]
struct BootstrapArgs {
    /// Signed-in user id
    #[arg(long)]
    user: String,
    /// native or web (defaults to config)
    #[arg(long)]
    platform: Option<String>,
    /// Permission before the app asks: granted, denied or default
    #[arg(long)]
    permission: Option<String>,
    /// The user refuses the permission prompt
    #[arg(long)]
    deny: bool,
    /// Registration succeeds but no token arrives
    #[arg(long)]
    no_token: bool,
    /// Delay before the simulated token arrives
    #[arg(long, default_value_t = 50)]
    token_delay_ms: u64,
    /// Token already stored on the user's profile
    #[arg(long)]
    profile_token: Option<String>,
    /// Foreground message to deliver after setup
    #[arg(long)]
    message: Option<PathBuf>,
    /// Extra translations (flat key/message JSON) layered over English
    #[arg(long)]
    messages: Option<PathBuf>,
    /// Firestore ID token; writes go to Firestore when a project is configured
    #[arg(long, env = "DIRECTORY_PUSH_ID_TOKEN")]
    id_token: Option<String>,
}

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    if let Ok(path) = std::env::var("DIRECTORY_PUSH_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    builder.init();
    Ok(())
}

fn read_payload(path: &PathBuf) -> Result<PushPayload> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    PushPayload::from_json(&json).with_context(|| format!("Invalid payload in {}", path.display()))
}

async fn run_bootstrap(config: Config, args: BootstrapArgs) -> Result<()> {
    let platform = match &args.platform {
        Some(p) => PlatformChoice::parse(p)
            .with_context(|| format!("Unknown platform '{p}' (expected native or web)"))?
            .resolve(),
        None => config.platform.resolve(),
    };

    let mut push = SimulatedPush::new().token_delay(Duration::from_millis(args.token_delay_ms));
    if let Some(permission) = &args.permission {
        push = push.with_permission(PermissionStatus::from_platform(permission));
    }
    if args.deny {
        push = push.denying();
    }
    if args.no_token {
        push = push.without_token();
    }
    let push = Arc::new(push);

    let memory = Arc::new(MemoryStore::new());
    let (profiles, notification_log): (Arc<dyn ProfileStore>, Arc<dyn NotificationLog>) =
        match (&config.firestore, args.id_token) {
            (Some(fs), Some(id_token)) => {
                log::info!("Persisting to Firestore project {}", fs.project_id);
                let store = Arc::new(FirestoreStore::new(reqwest::Client::new(), fs, id_token));
                (Arc::clone(&store) as Arc<dyn ProfileStore>, store as Arc<dyn NotificationLog>)
            }
            _ => (
                Arc::clone(&memory) as Arc<dyn ProfileStore>,
                Arc::clone(&memory) as Arc<dyn NotificationLog>,
            ),
        };

    let current = Arc::new(CurrentUser::new());
    let toasts = Arc::new(RecordingToasts::new());
    let mut catalog = Catalog::english();
    if let Some(path) = &args.messages {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read messages {}", path.display()))?;
        catalog.merge(
            Catalog::from_json(&json)
                .with_context(|| format!("Invalid messages in {}", path.display()))?,
        );
    }
    let translator = Arc::new(catalog);
    let router = Arc::new(ForegroundRouter::new(
        Arc::clone(&current) as Arc<dyn directory_push::AuthProvider>,
        notification_log,
        Arc::clone(&toasts) as Arc<dyn ToastSink>,
        Arc::clone(&translator) as Arc<dyn directory_push::i18n::Translator>,
    ));
    let local = Arc::new(RecordingNotifier::new());

    let adapter: Arc<dyn NotificationAdapter> = match platform {
        Platform::Native => Arc::new(
            NativeAdapter::new(
                Arc::clone(&push) as Arc<dyn NativePushBridge>,
                router,
                Arc::clone(&local) as Arc<dyn LocalNotifier>,
            )
            .with_presentation_options(config.presentation_options.clone()),
        ),
        Platform::Web => Arc::new(BrowserAdapter::new(
            Arc::clone(&push) as Arc<dyn BrowserMessaging>,
            BrowserOptions {
                vapid_key: config.web_vapid_key.clone(),
                icon: config.notification_icon.clone(),
            },
            router,
            Arc::clone(&local) as Arc<dyn LocalNotifier>,
        )),
    };

    let boot = Arc::new(
        SessionBootstrapper::new(
            adapter,
            profiles,
            Arc::clone(&toasts) as Arc<dyn ToastSink>,
            translator,
        )
        .with_token_wait(config.token_wait_timeout()),
    );

    let auth_user = AuthUser {
        uid: args.user,
        fcm_token: args.profile_token,
    };
    current.set(Some(auth_user.clone()));

    println!("Bootstrapping {} on {} platform...", auth_user.uid, platform);
    let outcome = match boot.on_auth_changed(Some(auth_user.clone())) {
        Some(run) => run.await.context("Bootstrap task panicked")?,
        None => BootstrapOutcome::Skipped,
    };

    match &outcome {
        BootstrapOutcome::Completed(report) => {
            println!("Permission: {}", report.permission);
            println!(
                "Token: {}",
                report.token.as_ref().map_or("none".to_string(), |t| t.preview())
            );
            println!("Token persisted: {}", report.token_persisted);
            for issue in &report.issues {
                println!("Issue: {issue}");
            }
        }
        other => println!("Outcome: {other:?}"),
    }

    if let Some(path) = args.message {
        let payload = read_payload(&path)?;
        if push.deliver(payload) {
            // Let the listener task route it
            tokio::time::sleep(Duration::from_millis(50)).await;
        } else {
            println!("No listener attached; message dropped");
        }
    }

    for toast in toasts.take() {
        println!("Toast [{:?}] {}: {}", toast.variant, toast.title, toast.description);
    }
    for shown in local.shown() {
        println!("Local notification: {}: {}", shown.title, shown.body);
    }
    if let Some(profile) = memory.profile(&auth_user.uid) {
        println!("Profile: {}", serde_json::to_string_pretty(&profile)?);
    }
    let log_entries = memory.notifications(&auth_user.uid);
    if !log_entries.is_empty() {
        println!("Notification log: {}", serde_json::to_string_pretty(&log_entries)?);
    }

    boot.on_auth_changed(None);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { file } => {
            let payload = read_payload(&file)?;
            println!("{}", serde_json::to_string_pretty(&normalize(&payload))?);
        }
        Commands::Bootstrap(args) => {
            let config = Config::load()?;
            run_bootstrap(config, args).await?;
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("Resolved platform: {}", config.platform.resolve());
        }
    }

    Ok(())
}
