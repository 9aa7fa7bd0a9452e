use augur::toolserver::web_search::WebSearchState;
use augur::toolserver::{self, web_search};
use clap::Parser;
use std::error::Error;
use std::net::SocketAddr;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "augur-web-search", version, about = "Web-search tool server")]
struct Cli {
    #[arg(long, default_value_t = 5001)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    augur::init_tracing();
    let cli = Cli::parse();

    let state = WebSearchState::from_env();
    if !state.credential_present() {
        warn!("BRAVE_API_KEY is not set; searches will fail until it is configured");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(port = cli.port, "Starting web-search tool server");
    toolserver::serve(web_search::app(state), addr).await?;
    Ok(())
}
