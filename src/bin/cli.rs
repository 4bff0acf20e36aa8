//! GeneProg CLI
//!
//! Command-line front end: ask the agent a question, generate a conversation
//! title, or list the analysis tools exposed by the MCP server.

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use geneprog_agent::agent::{
    generate_title, run_agentic_loop, AgentLoopInput, LoopCallback, LoopConfig, LoopOutcome,
    Message, OpenAiClient,
};
use geneprog_agent::config::{Config, LogConfig};
use geneprog_agent::mcp::McpClient;
use geneprog_agent::tools::{ToolCatalog, ToolResult};
use geneprog_agent::VERSION;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "geneprog",
    author = "GeneProg Contributors",
    version = VERSION,
    about = "GeneProg - chat with your gene program analyses",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question; the agent may call analysis tools to answer it
    Chat {
        /// The question
        question: String,

        /// Model to use instead of OPENAI_MODEL
        #[arg(short, long)]
        model: Option<String>,

        /// File describing the uploaded datasets
        #[arg(short, long)]
        context_file: Option<PathBuf>,

        /// Round cap instead of MAX_TOOL_ROUNDS
        #[arg(long)]
        max_rounds: Option<u32>,
    },

    /// Generate a short title for a conversation's first message
    Title {
        /// The first message of the conversation
        message: String,

        /// Model to use instead of OPENAI_MODEL
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the tools exposed by the MCP server
    Tools,
}

/// Prints tool activity to stderr while the agent works
struct ProgressPrinter;

#[async_trait]
impl LoopCallback for ProgressPrinter {
    async fn on_round_start(&self, round: u32) {
        eprintln!("[round {}]", round);
    }

    async fn on_tool_executed(&self, tool_name: &str, result: &ToolResult) {
        let status = if result.is_error { "error" } else { "ok" };
        eprintln!("  -> {} ({})", tool_name, status);
    }
}

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if log.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    init_logging(&config.log);
    config.validate()?;

    info!("Starting GeneProg v{}", VERSION);

    match cli.command {
        Commands::Chat {
            question,
            model,
            context_file,
            max_rounds,
        } => chat(&config, question, model, context_file, max_rounds).await,
        Commands::Title { message, model } => title(&config, &message, model.as_deref()).await,
        Commands::Tools => list_tools(&config).await,
    }
}

async fn chat(
    config: &Config,
    question: String,
    model: Option<String>,
    context_file: Option<PathBuf>,
    max_rounds: Option<u32>,
) -> anyhow::Result<()> {
    let completion = OpenAiClient::new(config.openai.clone())?;
    let provider = McpClient::new(&config.mcp)?;

    let domain_context = match context_file {
        Some(path) => Some(
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let input = AgentLoopInput {
        messages: vec![Message::user(question)],
        completion: &completion,
        provider: &provider,
        config: LoopConfig::with_max_rounds(max_rounds.unwrap_or(config.agent.max_tool_rounds)),
        model_override: model,
        domain_context,
        callback: ProgressPrinter,
    };

    let output = run_agentic_loop(input).await?;
    if output.outcome == LoopOutcome::RoundLimitReached {
        eprintln!("(stopped after {} rounds)", output.rounds);
    }
    info!(
        "Chat finished in {} rounds, {} tokens",
        output.rounds, output.total_usage.total_tokens
    );

    println!("{}", output.response);
    Ok(())
}

async fn title(config: &Config, message: &str, model: Option<&str>) -> anyhow::Result<()> {
    let completion = OpenAiClient::new(config.openai.clone())?;
    let title = generate_title(&completion, message, model, &config.title).await;
    println!("{}", title);
    Ok(())
}

async fn list_tools(config: &Config) -> anyhow::Result<()> {
    let provider = McpClient::new(&config.mcp)?;
    let catalog = ToolCatalog::fetch(&provider).await?;

    println!("{} tools at {}", catalog.len(), provider.endpoint());
    for tool in catalog.descriptors() {
        let summary = tool.description.lines().next().unwrap_or_default();
        println!("  {:<32} {}", tool.name, summary);
    }
    Ok(())
}
