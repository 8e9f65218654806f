//! llm-translate-proxy: local HTTP translation proxy
//!
//! Sits between a game-side text hooker and an OpenAI-compatible LLM API:
//! - protects markup/newlines from the model with `[T_n]` tokens
//! - keeps bounded per-client conversation context
//! - rotates API keys and retries failed attempts

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use llm_translate_proxy::{
    load_config, AppConfig, FileGlossary, NoopPipeline, Server, TracingSink, Translator,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Parser)]
#[command(name = "llm-translate-proxy")]
#[command(version = "0.1.0")]
#[command(about = "Local HTTP translation proxy backed by an OpenAI-compatible upstream")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.ini")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the translation server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override upstream base URL (e.g., "http://localhost:8080/v1")
        #[arg(long)]
        api_base: Option<String>,
        /// Override upstream model name
        #[arg(long)]
        model: Option<String>,
    },

    /// Validate configuration file
    CheckConfig,

    /// Test connection to the configured upstream
    TestUpstream,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Run {
            port,
            api_base,
            model,
        } => {
            run_proxy(cli.config, port, api_base, model).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config)?;
        }
        Commands::TestUpstream => {
            test_upstream(cli.config).await?;
        }
    }

    Ok(())
}

/// Run the translation server until Ctrl-C
async fn run_proxy(
    config_path: PathBuf,
    port_override: Option<u16>,
    api_base_override: Option<String>,
    model_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config_or_exit(&config_path);

    if let Some(port) = port_override {
        config.port = port;
    }
    if let Some(api_base) = api_base_override {
        config.api_base = api_base;
    }
    if let Some(model) = model_override {
        config.model = model;
    }

    tracing::info!("Loading configuration from {:?}", config_path);
    log_config_settings(&config);

    let translator = Arc::new(Translator::new(
        config,
        Arc::new(FileGlossary::new()),
        Arc::new(NoopPipeline),
        Arc::new(TracingSink),
    )?);

    let server = Server::new(translator);
    let addr = server.start().await?;
    tracing::info!("llm-translate-proxy listening on {}", addr);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    server.stop().await;

    Ok(())
}

/// Log all configuration settings at startup (masks sensitive values)
fn log_config_settings(config: &AppConfig) {
    tracing::info!("=== Configuration ===");
    tracing::info!(port = config.port, max_threads = config.max_threads, "Server");
    tracing::info!(
        api_base = %config.api_base,
        model = %config.model,
        key_count = config.api_keys().len(),
        temperature = config.temperature,
        "Upstream"
        // Note: keys themselves are intentionally NOT logged
    );
    tracing::info!(
        context_num = config.context_num,
        language = config.language,
        "Translation"
    );
    tracing::info!(
        enabled = config.enable_glossary,
        path = %config.glossary_path,
        "Glossary"
    );
    tracing::info!("=== End Configuration ===");
}

/// Validate configuration file
fn check_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match AppConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: 0.0.0.0:{}", config.port);
            println!("  Workers: {}", config.worker_count());
            println!("\nUpstream:");
            println!("  Base URL: {}", config.api_base);
            println!("  Model: {}", config.model);
            println!("  API keys: {}", config.api_keys().len());
            println!("  Temperature: {}", config.temperature);
            println!("\nTranslation:");
            println!("  Context pairs: {}", config.context_num);
            println!("  Language: {}", config.language);
            println!("\nGlossary:");
            println!("  Enabled: {}", config.enable_glossary);
            if config.enable_glossary {
                println!("  Path: {}", config.glossary_path);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Test connection to the configured upstream
async fn test_upstream(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_exit(&config_path);
    let keys = config.api_keys();

    let base = config.api_base.trim_end_matches('/');
    let models_url = format!("{}/models", base);
    println!("Testing upstream: {}", base);
    println!("  GET {}", models_url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let mut request = client.get(&models_url);
    if let Some(key) = keys.first() {
        request = request.bearer_auth(key);
    } else {
        println!("  (no API key configured, probing unauthenticated)");
    }

    match request.send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                println!("  ✓ Reachable ({})", resp.status());
                if let Ok(json) = resp.json::<serde_json::Value>().await {
                    if let Some(data) = json.get("data").and_then(|d| d.as_array()) {
                        println!("    Available models: {}", data.len());
                        for model in data.iter().take(5) {
                            if let Some(id) = model.get("id").and_then(|i| i.as_str()) {
                                println!("      - {}", id);
                            }
                        }
                    }
                }
            } else {
                println!("  ✗ Error status: {}", resp.status());
            }
        }
        Err(e) => {
            println!("  ✗ Failed to connect: {}", e);
        }
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: &PathBuf) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.ini file with a [Settings] section.");
            std::process::exit(1);
        }
    }
}
