use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use rconqueue::action::{ActionType, GenericCommandAction, IntervalGenerator, TickContext, join_command};
use rconqueue::cli::{Cli, Command, OutputFormat};
use rconqueue::{ActionManager, Config, ConsoleBuffer, ConsoleOutput, RconClient, SharedSettings};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rconqueue")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
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

    let log_file = fs::File::create(log_dir.join("rconqueue.log")).context("Failed to create log file")?;

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

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(host = %config.rcon.host, port = config.rcon.port, "rconqueue loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Exec { command, timeout_secs } => cmd_exec(&config, &command, timeout_secs).await,
        Command::Watch { command, interval_secs } => cmd_watch(&config, &command, interval_secs).await,
        Command::Config { format } => cmd_config(&config, format),
    }
}

fn new_manager(config: &Config, console: Arc<dyn ConsoleOutput>) -> ActionManager {
    let client = RconClient::new().with_timeout(config.rcon.timeout());
    let settings = Arc::new(SharedSettings::new(config.clone()));
    ActionManager::new(config, Box::new(client), settings, Some(console))
}

/// Send one reliable command and print its response
async fn cmd_exec(config: &Config, command: &[String], timeout_secs: u64) -> Result<()> {
    debug!(?command, timeout_secs, "cmd_exec: called");
    let (name, args) = command
        .split_first()
        .ok_or_else(|| eyre!("No command given"))?;
    let text = join_command(name, &args.join(" "));

    // Responses are printed from the handle below
    let manager = new_manager(config, Arc::new(ConsoleBuffer::new()));
    let handle = manager.run_command_async(&text, true);

    let result = tokio::time::timeout(Duration::from_secs(timeout_secs), handle.wait()).await;
    manager.shutdown().await?;

    match result {
        Ok(Ok(response)) => {
            if response.is_empty() {
                println!("{}", "(no output)".dimmed());
            } else {
                print!("{}", response);
                if !response.ends_with('\n') {
                    println!();
                }
            }
            Ok(())
        }
        Ok(Err(e)) => Err(e).context(format!("Command '{}' failed", text)),
        Err(_) => Err(eyre!(
            "No response from {}:{} within {}s",
            config.rcon.host,
            config.rcon.port,
            timeout_secs
        )),
    }
}

/// Queue a status-type command every interval and print responses until Ctrl-C
async fn cmd_watch(config: &Config, command: &str, interval_secs: u64) -> Result<()> {
    debug!(%command, interval_secs, "cmd_watch: called");
    let console: Arc<dyn ConsoleOutput> = Arc::new(|chunk: &str| {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        println!("{} {}", format!("[{}]", stamp).dimmed(), chunk.trim_end());
    });
    let mut manager = new_manager(config, console);

    let poll = command.to_string();
    let interval = Duration::from_secs(interval_secs);
    manager.add_periodic_generator(Box::new(IntervalGenerator::new(
        interval,
        move |ctx: &mut TickContext<'_>| {
            let action = GenericCommandAction::new(poll.clone(), "")
                .with_type(ActionType::Status)
                .with_min_interval(interval)
                .with_max_queued(1);
            ctx.submit(Box::new(action));
        },
    )));

    println!(
        "Watching {}:{} with '{}' every {}s, press {} to stop",
        config.rcon.host,
        config.rcon.port,
        command.yellow(),
        interval_secs,
        "Ctrl-C".yellow()
    );

    let mut ticker = tokio::time::interval(config.scheduler.driver_period());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.update();
            }
            res = &mut ctrl_c => {
                res.context("Failed to listen for Ctrl-C")?;
                info!("Ctrl-C received, stopping watch");
                break;
            }
        }
    }

    let stats = manager.stats();
    let abandoned = manager.shutdown().await?;
    println!(
        "{} {} ticks, {} commands written, {} abandoned",
        "Stopped:".green(),
        stats.total_ticks,
        stats.total_commands_written,
        abandoned
    );
    Ok(())
}

/// Print the effective configuration with secrets redacted
fn cmd_config(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_config: called");
    let redacted = config.redacted();
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&redacted).context("Failed to serialize config")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            let yaml = serde_yaml::to_string(&redacted).context("Failed to serialize config")?;
            println!("{}", "Effective configuration:".bold());
            print!("{}", yaml);
        }
    }
    Ok(())
}
