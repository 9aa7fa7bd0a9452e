use augur::toolserver::code_search::CodeSearchState;
use augur::toolserver::{self, code_search};
use clap::Parser;
use std::error::Error;
use std::net::SocketAddr;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "augur-code-search", version, about = "Code-hosting search tool server")]
struct Cli {
    #[arg(long, default_value_t = 5002)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    augur::init_tracing();
    let cli = Cli::parse();

    let state = CodeSearchState::from_env();
    if !state.credential_present() {
        // The GitHub API works unauthenticated, just with tighter rate limits.
        warn!("GITHUB_TOKEN is not set; API rate limits will be lower");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(port = cli.port, "Starting code-search tool server");
    toolserver::serve(code_search::app(state), addr).await?;
    Ok(())
}
