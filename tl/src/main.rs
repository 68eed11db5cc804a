//! Taskle CLI entry point

use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use tracing::{debug, info, warn};

use taskle::cli::{Cli, Command, KeyCommand};
use taskle::config::Config;
use taskle::credentials::{ApiKey, CredentialStore};
use taskle::decomposer::DecompositionService;
use taskle::llm::create_client;
use taskle::panel::listener::{cleanup_socket, create_listener_at, serve};
use taskle::panel::{CommandHandler, PanelClient, PanelCommand, PanelConnection, PanelEvent};
use taskle::state::StateManager;
use taskstore::TaskList;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskle")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("taskle.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::List => run_task_command(&config, PanelCommand::Ready).await,
        Command::Add { text } => run_task_command(&config, PanelCommand::AddTask { task: text }).await,
        Command::Delete { id } => run_task_command(&config, PanelCommand::DeleteTask { task_id: id }).await,
        Command::Clear => run_task_command(&config, PanelCommand::ClearTasks).await,
        Command::Reorder { ids } => run_task_command(&config, PanelCommand::ReorderTasks { task_ids: ids }).await,
        Command::Decompose { text, depth } => {
            run_task_command(&config, PanelCommand::ProcessTask { task: text, depth }).await
        }
        Command::Serve => cmd_serve(&config).await,
        Command::Key { command } => match command {
            KeyCommand::Set { key, no_validate } => cmd_key_set(&config, key, no_validate).await,
            KeyCommand::Status => cmd_key_status(&config).await,
            KeyCommand::Clear => cmd_key_clear(&config),
        },
    }
}

/// Where task commands are executed
enum Backend {
    /// A running panel server owns the store
    Remote(PanelConnection),
    /// No server; this process owns the store for one command
    Local(CommandHandler),
}

impl Backend {
    async fn connect(config: &Config) -> Result<Self> {
        // decomposition can take up to the API timeout
        let timeout = Duration::from_millis(config.llm.timeout_ms) + Duration::from_secs(5);
        let client = PanelClient::new(&config.panel.socket_path).with_timeout(timeout);

        if client.socket_exists() {
            match client.connect().await {
                Ok(conn) => {
                    debug!(socket_path = ?client.socket_path(), "Backend: using panel server");
                    return Ok(Backend::Remote(conn));
                }
                Err(e) => warn!(error = %e, "Panel socket present but not answering, running locally"),
            }
        }

        Ok(Backend::Local(build_handler(config)?))
    }

    async fn send(&mut self, command: PanelCommand) -> Result<PanelEvent> {
        match self {
            Backend::Remote(conn) => conn.send(&command).await,
            Backend::Local(handler) => Ok(handler.handle(command).await),
        }
    }
}

fn build_handler(config: &Config) -> Result<CommandHandler> {
    let state = StateManager::spawn(&config.storage.tasks_path)?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let decomposer = DecompositionService::new(llm, CredentialStore::from_config(config));
    Ok(CommandHandler::new(state, Arc::new(decomposer)))
}

async fn run_task_command(config: &Config, command: PanelCommand) -> Result<()> {
    debug!(?command, "run_task_command: called");
    let mut backend = Backend::connect(config).await?;

    match backend.send(command).await? {
        PanelEvent::DisplayTasks { tasks } => {
            print_tasks(&tasks);
            Ok(())
        }
        PanelEvent::Notice { message, .. } => bail!(message),
    }
}

fn print_tasks(tasks: &TaskList) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }

    for (i, task) in tasks.iter().enumerate() {
        println!("{:>3}. {}  {}", i + 1, task.text, task.id.dimmed());
    }
}

/// Run the panel server until Ctrl-C
async fn cmd_serve(config: &Config) -> Result<()> {
    debug!("cmd_serve: called");
    let handler = build_handler(config)?;
    let (listener, socket_path) = create_listener_at(&config.panel.socket_path)?;

    println!("{} Panel server listening on {}", "✓".green(), socket_path.display().to_string().cyan());
    info!(?socket_path, "Panel server started");

    let result = serve(listener, handler, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
    })
    .await;

    cleanup_socket(&socket_path);
    result
}

async fn cmd_key_set(config: &Config, key: Option<String>, no_validate: bool) -> Result<()> {
    debug!(no_validate, "cmd_key_set: called");
    let raw = match key {
        Some(key) => key,
        None => {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).context("Failed to read API key from stdin")?;
            line
        }
    };
    let key = ApiKey::new(raw)?;

    if !no_validate {
        let client = create_client(&config.llm).context("Failed to create LLM client")?;
        if let Err(e) = client.validate_key(&key).await {
            if e.is_auth_failure() {
                bail!("API key was rejected by {}", config.llm.base_url);
            }
            return Err(e).context("Failed to validate API key");
        }
    }

    let store = CredentialStore::from_config(config);
    store.set(&key)?;
    println!("{} API key saved to {}", "✓".green(), store.path().display());
    Ok(())
}

async fn cmd_key_status(config: &Config) -> Result<()> {
    debug!("cmd_key_status: called");
    let store = CredentialStore::from_config(config);
    let Some((key, source)) = store.resolve()? else {
        println!("{} API Key is not yet set.", "✗".red());
        return Ok(());
    };

    println!("{} API key set (from {})", "✓".green(), source);

    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    match client.validate_key(&key).await {
        Ok(()) => println!("{} API key accepted by {}", "✓".green(), config.llm.base_url),
        Err(e) if e.is_auth_failure() => println!("{} API key rejected by {}", "✗".red(), config.llm.base_url),
        Err(e) if e.is_rate_limit() => println!(
            "{} API key accepted but rate limited, retry in {}s",
            "!".yellow(),
            e.retry_after().unwrap_or_default().as_secs()
        ),
        Err(e) => {
            warn!(error = %e, "Key validation failed");
            println!("{} Could not validate API key: {}", "?".yellow(), e);
        }
    }
    Ok(())
}

fn cmd_key_clear(config: &Config) -> Result<()> {
    let store = CredentialStore::from_config(config);
    if store.clear()? {
        println!("{} API key removed", "✓".green());
    } else {
        println!("No stored API key");
    }
    Ok(())
}
