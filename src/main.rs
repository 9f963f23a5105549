use std::sync::Arc;

use clap::Parser;
use clap::builder::TypedValueParser;
use tokio::io::BufReader;

use searchbot::config::CONFIG;
use searchbot::conversation::ConversationLoop;
use searchbot::data_models::Role;
use searchbot::llm::GroqClient;
use searchbot::registry::{ToolDescriptor, ToolRegistry};
use searchbot::roles::{DEFAULT_MAX_TURNS, ExecutorRole, RequesterRole, SYSTEM_PROMPT};
use searchbot::search::{SearchTool, TavilyClient};

/// Console chatbot backed by Groq, with Tavily web search as a tool.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Model to ask; overrides GROQ_MODEL.
    #[arg(long)]
    model: Option<String>,

    /// Upper bound on requester replies per user message.
    #[arg(long, default_value_t = DEFAULT_MAX_TURNS, value_parser = clap::value_parser!(u16).range(1..).map(usize::from))]
    max_turns: usize,

    /// Log more (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    // stdout belongs to the conversation
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut llm_config = CONFIG.llm();
    if let Some(model) = cli.model {
        llm_config.model = model;
    }
    tracing::info!(model = %llm_config.model, "starting chatbot");

    let search_tool = Arc::new(SearchTool::new(Arc::new(TavilyClient::new(CONFIG.search()))));
    let mut registry = ToolRegistry::new();
    registry.register(
        ToolDescriptor::web_search(search_tool),
        Role::Requester,
        Role::Executor,
    );
    let registry = Arc::new(registry);

    let requester = RequesterRole::new(
        Arc::new(GroqClient::new(llm_config)),
        SYSTEM_PROMPT,
        &registry,
    );
    let executor = ExecutorRole::new(registry.clone());

    let chat = ConversationLoop::new(requester, executor, cli.max_turns);
    chat.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}
