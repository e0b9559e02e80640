// abacus-cli/src/main.rs
mod models;

use anyhow::{anyhow, Context, Result};
use colored::*;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};

use abacus_core::{
    openai_tool_from_descriptor, ChatConfig, ChatSession, McpConnection, ServerIdentity,
    SessionError, ToolBackend, ToolDefinition,
};

use clap::Parser;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const CONFIG_FILENAME: &str = "Abacus.toml";
const LOG_FILE_NAME: &str = "abacus-app.log";

fn find_project_root() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    find_project_root_from(&current_dir)
}

fn find_project_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start;
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() && config_path.is_file() {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(anyhow!(
                    "Could not find '{}' in current directory or any parent directory.",
                    CONFIG_FILENAME
                ));
            }
        }
    }
}

fn load_cli_config() -> Result<ChatConfig> {
    let project_root = find_project_root()?;
    info!(
        "Found configuration file at: {:?}",
        project_root.join(CONFIG_FILENAME)
    );
    load_config_from_root(&project_root)
}

fn load_config_from_root(project_root: &Path) -> Result<ChatConfig> {
    let config_path = project_root.join(CONFIG_FILENAME);
    let config_toml_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read project config file: {:?}", config_path))?;
    let config = ChatConfig::from_toml_str(&config_toml_content)
        .context("Failed to parse or validate configuration content")?;
    Ok(config)
}

/// The single quit keyword; matched case-insensitively after trimming.
fn is_exit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

fn print_welcome_message(identity: &ServerIdentity, tools: &[ToolDefinition]) {
    println!("\n{}", "Abacus - Chat Calculator".cyan().bold());
    println!(
        "{} {} v{}",
        "Connected to:".cyan(),
        identity.name,
        identity.version
    );
    if tools.is_empty() {
        println!("{}", "No tools available for this session.".dimmed());
    } else {
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        println!("{} {}", "Available tools:".cyan(), names.join(", "));
    }
    println!("{}", "Type 'exit' or press Ctrl-D to quit.".dimmed());
    println!();
}

fn thinking_spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "-"]),
    );
    pb.set_message("Thinking...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

/// Runs the interactive REPL until the user quits or a turn fails.
async fn run_interactive(mut session: ChatSession) -> Result<()> {
    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl = DefaultEditor::with_config(rl_config)?;

    // Keep readline history in the cache dir, next to the logs.
    let history_dir = dirs::cache_dir()
        .map(|d| d.join("abacus"))
        .ok_or_else(|| anyhow!("Could not determine cache directory for history file"))?;
    fs::create_dir_all(&history_dir).context("Failed to create history directory")?;
    let history_file_path = history_dir.join("cli_history.txt");

    if rl.load_history(&history_file_path).is_err() {
        debug!(path = %history_file_path.display(), "No previous CLI history found or error loading.");
    }

    let prompt = format!("{} ", ">".green().bold());
    let mut turn_failure: Option<SessionError> = None;

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if is_exit_command(trimmed_input) {
                    info!("Exit command entered, leaving interactive mode.");
                    break;
                }

                let pb = thinking_spinner()?;
                let turn_result = session.run_turn(trimmed_input).await;
                pb.finish_and_clear();

                match turn_result {
                    Ok(answer) => {
                        println!("\n{}\n", answer);
                    }
                    Err(e) => {
                        // Completion failures end the session; anything
                        // recoverable was already folded into the turn.
                        error!("Chat turn failed: {}", e);
                        eprintln!("\n{} {}\n", "Error:".red(), e);
                        turn_failure = Some(e);
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C cancels the current line, not the session.
                println!("{}", "^C".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => {
                info!("EOF detected, exiting interactive mode.");
                break;
            }
            Err(err) => {
                error!("Readline error: {:?}", err);
                eprintln!("Error reading input: {}", err.to_string().red());
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history_file_path) {
        warn!(path = %history_file_path.display(), error = %e, "Failed to save CLI history.");
    } else {
        debug!(path = %history_file_path.display(), "Saved CLI history.");
    }

    println!("\n{}\n", "Exiting.".cyan());

    match turn_failure {
        Some(e) => Err(anyhow!(e)),
        None => Ok(()),
    }
}

async fn run_session(connection: &Arc<McpConnection>, config: ChatConfig) -> Result<()> {
    let identity = connection.connect().await.map_err(SessionError::Mcp)?;
    info!(server = %identity.name, version = %identity.version, "MCP server ready.");

    // A failed listing is not fatal: the session continues and the model
    // simply has no tools to call.
    let tool_definitions: Vec<ToolDefinition> = match connection.list_tools().await {
        Ok(descriptors) => descriptors.iter().map(openai_tool_from_descriptor).collect(),
        Err(e) => {
            warn!("Tool discovery failed: {:#}. Continuing without tools.", e);
            eprintln!(
                "{}",
                "Warning: could not list tools from the MCP server; continuing without tools."
                    .yellow()
            );
            Vec::new()
        }
    };

    print_welcome_message(&identity, &tool_definitions);

    let backend: Arc<dyn ToolBackend> = connection.clone();
    let session = ChatSession::new(config, backend, tool_definitions)
        .map_err(|e| SessionError::Config(format!("Failed to create chat session: {}", e)))?;

    run_interactive(session).await
}

async fn run_chat(mut config: ChatConfig) -> Result<()> {
    config
        .resolve_api_key()
        .map_err(|e| SessionError::Config(format!("{:#}", e)))?;

    let connection = Arc::new(McpConnection::new(
        config.server.command.clone(),
        config.server.args.clone(),
    ));

    let result = run_session(&connection, config).await;

    // The server comes down on every exit path, clean or not.
    info!("Shutting down MCP server connection.");
    connection.shutdown().await;

    result
}

#[tokio::main]
async fn main() -> ExitCode {
    // Ensure colored output is enabled for early errors
    colored::control::set_override(true);

    dotenvy::dotenv().ok();
    let cli = models::cli::Cli::parse();

    // --- Logging Setup ---
    let default_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = match dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .or_else(|| Some(env::temp_dir()))
        .map(|d| d.join("abacus"))
    {
        Some(dir) => dir,
        None => {
            eprintln!(
                "{}",
                "Error: Could not determine a suitable directory for log files.".red()
            );
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!(
            "{} Failed to create log directory {}: {}",
            "Error:".red(),
            log_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let log_path = log_dir.join(LOG_FILE_NAME);

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false) // No colors in file
        .with_target(true)
        .with_line_number(true);

    let time_format_desc = match time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) {
        Ok(desc) => desc,
        Err(e) => {
            eprintln!("Warning: Failed to parse time format, using default: {}", e);
            time::format_description::parse("[hour]:[minute]:[second]")
                .expect("Fallback time format failed")
        }
    };
    let local_timer = LocalTime::new(time_format_desc);

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(local_timer.clone())
        .with_target(false)
        .with_level(true);

    let file_layer = file_layer.with_timer(local_timer);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("{} Failed to initialize logging: {}", "Error:".red(), e);
        return ExitCode::FAILURE;
    }
    // Let tracing control colors from here on.
    colored::control::unset_override();

    info!(
        "Logging initialized. Level determined by RUST_LOG or -v flags (default: {}). Logging to stderr and {}",
        default_level,
        log_path.display()
    );
    // --- End Logging Setup ---

    let config = match load_cli_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            eprintln!(
                "{} Could not find or load '{}'. Ensure you are in an Abacus project directory.",
                "Error:".red(),
                CONFIG_FILENAME
            );
            return ExitCode::FAILURE;
        }
    };

    match run_chat(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Session ended with error: {:#}", e);
            // Turn failures were already shown inside the REPL.
            let already_reported =
                matches!(e.downcast_ref::<SessionError>(), Some(SessionError::Api(_)));
            if !already_reported {
                eprintln!("{} {}", "Error:".red(), e);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abacus_core::{ModelConfig, ServerConfig};
    use tempfile::tempdir;

    const SAMPLE_CONFIG: &str = r#"
system_prompt = "You are a calculator assistant."

[model]
model_name = "test-model"
endpoint = "https://api.example.com/v1/chat/completions"

[server]
command = "abacus-calc-server"
args = []
"#;

    fn test_config() -> ChatConfig {
        ChatConfig {
            system_prompt: "You are a calculator assistant.".to_string(),
            api_key_env_var: "OPENAI_API_KEY".to_string(),
            model: ModelConfig {
                model_name: "test-model".to_string(),
                endpoint: "https://api.example.com/v1/chat/completions".to_string(),
                parameters: None,
            },
            server: ServerConfig {
                command: "abacus-calc-server".to_string(),
                args: vec![],
            },
            api_key: "test-api-key".to_string(),
        }
    }

    #[test]
    fn exit_command_matching() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("EXIT"));
        assert!(is_exit_command("  Exit  "));
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command("quit"));
        assert!(!is_exit_command(""));
    }

    // The connection handle is cloned into the session as its tool backend;
    // the caller keeps the original for shutdown.
    #[test]
    fn session_builds_from_shared_connection_handle() {
        let connection = Arc::new(McpConnection::new(
            "abacus-calc-server".to_string(),
            vec![],
        ));
        let backend: Arc<dyn ToolBackend> = connection.clone();

        let session = ChatSession::new(test_config(), backend, Vec::new()).unwrap();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, "system");
    }

    #[test]
    fn project_root_found_from_nested_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), SAMPLE_CONFIG).unwrap();
        let nested = dir.path().join("demos").join("deep");
        fs::create_dir_all(&nested).unwrap();

        let root = find_project_root_from(&nested).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn config_loads_from_discovered_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), SAMPLE_CONFIG).unwrap();

        let root = find_project_root_from(dir.path()).unwrap();
        let config = load_config_from_root(&root).unwrap();
        assert_eq!(config.model.model_name, "test-model");
        assert_eq!(config.server.command, "abacus-calc-server");
        assert_eq!(config.api_key_env_var, "OPENAI_API_KEY");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempdir().unwrap();

        let err = load_config_from_root(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to read project config file"));
    }
}
