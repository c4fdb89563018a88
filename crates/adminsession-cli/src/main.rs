//! adminsession - terminal host for the admin dashboard session manager.
//!
//! Plays the part of a dashboard page: hydrates the session from storage,
//! renders the route guard decision, and in `watch` mode keeps the
//! credential fresh until interrupted.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adminsession_core::{
    route, Avatar, Config, HttpBackend, Origin, ProfileUpdate, Route, Session, SessionService,
    Visibility,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable consulted before prompting for a password
const ENV_PASSWORD: &str = "ADMINSESSION_PASSWORD";

/// Time given to the detached backend logout call before the process exits
const LOGOUT_GRACE: Duration = Duration::from_millis(750);

/// How often `watch` re-reads storage for logouts made by other processes
const STORAGE_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "adminsession", version, about = "Admin dashboard session manager")]
struct Cli {
    /// Override the backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show what the dashboard would render
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in
    Login {
        #[arg(long)]
        email: String,
        /// Keep the session across restarts
        #[arg(long)]
        remember: bool,
    },
    /// Sign out everywhere
    Logout,
    /// Validate the session against the backend
    Whoami,
    /// Update username and avatar
    Profile {
        #[arg(long)]
        username: String,
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
    /// Keep the session alive and print every change.
    /// An empty input line simulates the page regaining focus; `q` quits.
    Watch,
}

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "adminsession.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    let _log_guard = init_tracing(&config);
    debug!(api = %config.api_base_url, storage = ?config.storage, "Configuration loaded");

    let backend = HttpBackend::with_timeout(&config.api_base_url, config.request_timeout())
        .context("Failed to build HTTP client")?;
    let origin = Origin::new(config.open_persistent_store()?);
    let service = SessionService::new(Arc::new(backend), origin.open_tab());
    service.initialize();

    match cli.command {
        Command::Status { json } => status(&service, json),
        Command::Login { email, remember } => login(&service, &email, remember).await,
        Command::Logout => logout(&service).await,
        Command::Whoami => whoami(&service).await,
        Command::Profile { username, avatar } => profile(&service, username, avatar).await,
        Command::Watch => watch(&service, config.refresh_interval()).await,
    }
}

fn render(session: &Session) -> String {
    match route(session) {
        Route::Loading => "Loading...".to_string(),
        Route::Login { error: Some(error) } => format!("Signed out ({})", error),
        Route::Login { error: None } => "Signed out".to_string(),
        Route::Protected => match session.identity {
            Some(ref identity) => format!(
                "Signed in as {} <{}> [{}]",
                identity.display_name(),
                identity.email,
                identity.role
            ),
            None => "Signed in".to_string(),
        },
    }
}

fn status(service: &SessionService, json: bool) -> Result<()> {
    let session = service.snapshot();
    if json {
        let output = serde_json::json!({
            "route": route(&session),
            "identity": session.identity,
            "scope": format!("{:?}", service.storage().selected_scope()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", render(&session));
    }
    Ok(())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

async fn login(service: &SessionService, email: &str, remember: bool) -> Result<()> {
    let password = read_password()?;
    if email.trim().is_empty() || password.is_empty() {
        anyhow::bail!("Email and password required");
    }

    match service.login(email.trim(), &password, remember).await {
        Ok(_) => {
            println!("{}", render(&service.snapshot()));
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e.user_message())),
    }
}

async fn logout(service: &SessionService) -> Result<()> {
    service.logout();
    tokio::time::sleep(LOGOUT_GRACE).await;
    println!("{}", render(&service.snapshot()));
    Ok(())
}

async fn whoami(service: &SessionService) -> Result<()> {
    if !service.is_authenticated() {
        anyhow::bail!("Not signed in");
    }
    let identity = service
        .validate()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

async fn profile(service: &SessionService, username: String, avatar: Option<PathBuf>) -> Result<()> {
    let avatar = match avatar {
        Some(path) => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read avatar {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "avatar".to_string());
            Some(Avatar::from_file_name(file_name, bytes))
        }
        None => None,
    };

    let identity = service
        .update_profile(ProfileUpdate { username, avatar })
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("Profile updated: {}", identity.display_name());
    Ok(())
}

async fn watch(service: &SessionService, refresh_interval: Duration) -> Result<()> {
    let _tasks = service.spawn_background(refresh_interval);
    let mut sessions = service.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut storage_poll = tokio::time::interval(STORAGE_POLL_INTERVAL);

    println!("{}", render(&sessions.borrow_and_update()));
    info!("Watching session");

    loop {
        tokio::select! {
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                let rendered = render(&sessions.borrow_and_update());
                println!("{}", rendered);
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().eq_ignore_ascii_case("q") => break,
                    Some(_) => {
                        service.tab().set_visibility(Visibility::Hidden);
                        service.tab().set_visibility(Visibility::Visible);
                    }
                    None => break,
                }
            }
            _ = storage_poll.tick() => {
                service.reconcile_with_storage();
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        io::stdout().flush()?;
    }

    info!("Stopped watching");
    Ok(())
}
