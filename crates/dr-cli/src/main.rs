use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dr_agents::{AgentPipeline, ResearchDriver};
use dr_core::AgentProgressHandler;
use dr_research::{format_citations, write_export, CitationStyle, ExportFormat};

mod chat;
mod config;

use chat::ConsoleProgress;
use config::Config;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Everything, including request bodies
    Trace,
    /// Tool calls, searches and agent iterations
    Debug,
    /// Research stages and attempts
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "dr")]
#[command(author, version, about = "Deep research assistant with source tracking and citations", long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Config file (default: ~/.config/deep-researcher/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Research a topic and print the report
    Research {
        /// Research question (read from stdin when omitted)
        query: Option<String>,

        /// Do not append the formatted reference list
        #[arg(long)]
        no_sources: bool,

        /// Citation style: apa, mla or plain (overrides config)
        #[arg(short, long)]
        style: Option<String>,

        /// Also write the report to FILE (.txt, .md or .json)
        #[arg(short, long, value_name = "FILE")]
        export: Option<PathBuf>,
    },
    /// Interactive research chat (default)
    Chat,
    /// Serve the research tools over MCP on stdio
    Serve,
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "debug"
    } else {
        cli.log_level.as_filter()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        // stdout carries reports and, for `serve`, the protocol
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(model = %config.llm.model, max_searches = config.search.max_searches, "Configuration loaded");

    match cli.command {
        Some(Commands::Research {
            query,
            no_sources,
            style,
            export,
        }) => research_mode(&config, query, !no_sources, style, export).await,
        Some(Commands::Serve) => {
            let driver = build_driver(&config, None)?;
            dr_mcp::serve_stdio(Arc::new(driver)).await?;
            Ok(())
        }
        Some(Commands::Config) => show_config(&config, cli.config),
        Some(Commands::Chat) | None => chat_mode(&config).await,
    }
}

fn build_driver(config: &Config, progress: Option<Arc<dyn AgentProgressHandler>>) -> Result<ResearchDriver> {
    let provider = Arc::new(config.gemini_provider()?);
    let search = Arc::new(config.linkup_client()?);

    let mut pipeline = AgentPipeline::new(provider, search).with_settings(config.pipeline_settings());
    if let Some(handler) = progress {
        pipeline = pipeline.with_progress(handler);
    }

    Ok(ResearchDriver::new(Arc::new(pipeline)).with_config(config.driver_config()))
}

fn read_query(query: Option<String>) -> Result<String> {
    let query = match query {
        Some(q) => q,
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read query from stdin")?;
            buf
        }
        None => anyhow::bail!("No query given. Pass one as an argument or pipe it on stdin."),
    };

    let query = query.trim().to_string();
    if query.is_empty() {
        anyhow::bail!("Query is empty");
    }
    Ok(query)
}

async fn research_mode(
    config: &Config,
    query: Option<String>,
    include_sources: bool,
    style: Option<String>,
    export: Option<PathBuf>,
) -> Result<()> {
    let query = read_query(query)?;
    let style = style
        .as_deref()
        .map(CitationStyle::parse)
        .unwrap_or_else(|| config.citation_style());

    let progress: Option<Arc<dyn AgentProgressHandler>> = if atty::is(atty::Stream::Stderr) {
        Some(Arc::new(ConsoleProgress::new(true)))
    } else {
        None
    };
    let driver = build_driver(config, progress)?;

    tracing::info!(query = %query, style = %style, "Starting research");
    let report = driver.research(&query).await;
    let output = if include_sources && report.is_completed() {
        format_citations(&report.content, &report.sources, style)
    } else {
        report.content.clone()
    };
    println!("{}", output);

    if let Some(path) = &export {
        write_export(path, ExportFormat::from_path(path), &output, &report.sources)
            .with_context(|| format!("Failed to export report to {}", path.display()))?;
        eprintln!("Report saved to {}", path.display());
    }

    if !report.is_completed() {
        anyhow::bail!("Research did not complete");
    }
    Ok(())
}

async fn chat_mode(config: &Config) -> Result<()> {
    let color = atty::is(atty::Stream::Stdout);
    let driver = build_driver(config, Some(Arc::new(ConsoleProgress::new(color))))?;
    chat::run_chat(&driver, config.citation_style(), color).await
}

fn show_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => Config::config_path()?,
    };
    println!("# Config file: {}", path.display());
    if !path.exists() {
        println!("# (not found, using defaults and environment)");
    }
    let rendered = toml::to_string_pretty(&config.redacted()).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_research_command() {
        let cli = Cli::try_parse_from([
            "dr", "--debug", "research", "quantum sensing", "--style", "mla", "--export", "out.json",
        ])
        .unwrap();
        assert!(cli.debug);
        match cli.command {
            Some(Commands::Research {
                query,
                no_sources,
                style,
                export,
            }) => {
                assert_eq!(query.as_deref(), Some("quantum sensing"));
                assert!(!no_sources);
                assert_eq!(style.as_deref(), Some("mla"));
                assert_eq!(export, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected research command"),
        }
    }

    #[test]
    fn test_default_is_chat() {
        let cli = Cli::try_parse_from(["dr", "--log-level", "info"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, LogLevel::Info);
    }

    #[test]
    fn test_read_query_trims() {
        assert_eq!(read_query(Some("  rust async  \n".into())).unwrap(), "rust async");
        assert!(read_query(Some("   ".into())).is_err());
    }

    #[test]
    fn test_build_driver_requires_keys() {
        assert!(build_driver(&Config::default(), None).is_err());

        let mut config = Config::default();
        config.llm.api_key = Some("gemini".into());
        config.search.api_key = Some("linkup".into());
        assert!(build_driver(&config, None).is_ok());
    }
}
