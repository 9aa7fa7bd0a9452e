use augur::config::AppConfig;
use augur::context::ContextAggregator;
use augur::model::ProviderRegistry;
use augur::orchestrator::Orchestrator;
use augur::server::{self, ServerState};
use augur::supervisor::{PidFile, ProcessSupervisor, ToolDirectory};
use clap::{Parser, ValueEnum};
use serde_json::json;
use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "augur",
    version,
    about = "Prompt orchestration over supervised tool servers and LLM providers"
)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long, default_value = "openai")]
    model: String,
    #[arg(long)]
    prompt_file: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Cli)]
    mode: RunMode,
    #[arg(long, default_value = "127.0.0.1:8080")]
    rest_addr: SocketAddr,
    prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    Cli,
    Rest,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    augur::init_tracing();
    info!("Starting augur");
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, model = %cli.model, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let config = AppConfig::load(config_path)?;

    let pid_file = PidFile::load(&config.pid_file);
    let supervisor = Arc::new(ProcessSupervisor::new(config.tools.clone(), pid_file));
    supervisor.recover().await;

    let providers = Arc::new(ProviderRegistry::from_env(&config.providers));
    if providers.available().is_empty() {
        warn!("no LLM providers available; set OPENAI_API_KEY and/or ANTHROPIC_API_KEY");
    }

    let directory: Arc<dyn ToolDirectory> = supervisor.clone();
    let aggregator = ContextAggregator::new(directory, config.query_deadline);
    let orchestrator = Arc::new(Orchestrator::new(aggregator, providers));

    match cli.mode {
        RunMode::Cli => {
            let prompt = load_prompt(&cli)?;
            info!(model = %cli.model, "Answering single prompt via CLI mode");
            let answer = orchestrator.answer(&cli.model, &prompt).await;
            let output = json!({
                "model": answer.model,
                "answer": answer.content,
                "full_prompt": answer.full_prompt,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        RunMode::Rest => {
            info!(addr = %cli.rest_addr, "Starting REST server");
            server::serve(ServerState::new(supervisor, orchestrator), cli.rest_addr).await?;
        }
    }
    Ok(())
}

fn load_prompt(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.prompt_file {
        info!(path = %path, "Loading prompt from file");
        let content = fs::read_to_string(path)?;
        return Ok(normalize_prompt(content));
    }

    if !cli.prompt.is_empty() {
        info!("Using prompt provided through CLI arguments");
        let joined = cli.prompt.join(" ");
        return Ok(normalize_prompt(joined));
    }

    if atty::isnt(atty::Stream::Stdin) {
        info!("Reading prompt from standard input");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(normalize_prompt(buffer));
    }

    warn!("Prompt not provided via arguments, file, or stdin");
    Err("prompt required via arguments, file, or stdin".into())
}

fn normalize_prompt(prompt: String) -> String {
    prompt.trim().to_string()
}
