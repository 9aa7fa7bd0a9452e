use augur::config::AppConfig;
use augur::supervisor::{PidFile, ProcessSupervisor, ToolStatus};
use augur::types::ToolState;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "augur-toolctl",
    version,
    about = "Manage the tool-server processes used by augur"
)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Start a tool server (or all of them)
    Start {
        #[arg(default_value = "all")]
        tool: String,
    },
    /// Stop a tool server (or all of them)
    Stop {
        #[arg(default_value = "all")]
        tool: String,
    },
    /// Show the status of every configured tool server
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    augur::init_tracing();
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool, Box<dyn Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(Path::new);
    let config = AppConfig::load(config_path)?;

    let pid_file = PidFile::load(&config.pid_file);
    let supervisor = ProcessSupervisor::new(config.tools.clone(), pid_file);
    supervisor.recover().await;

    let success = match cli.action {
        Action::Status => true,
        Action::Start { tool } => {
            let mut success = true;
            for name in select_targets(&supervisor, &tool) {
                debug!(tool = name.as_str(), "starting tool server");
                match supervisor.start(&name).await {
                    Ok(status) => match status.pid {
                        Some(pid) => println!("Tool server '{name}' is running (pid {pid})."),
                        None => println!("Tool server '{name}' is {}.", status.state.as_str()),
                    },
                    Err(error) => {
                        eprintln!("Failed to start '{name}': {error}");
                        success = false;
                    }
                }
            }
            success
        }
        Action::Stop { tool } => {
            let mut success = true;
            for name in select_targets(&supervisor, &tool) {
                debug!(tool = name.as_str(), "stopping tool server");
                match supervisor.stop(&name).await {
                    Ok(_) => println!("Tool server '{name}' is stopped."),
                    Err(error) => {
                        eprintln!("Failed to stop '{name}': {error}");
                        success = false;
                    }
                }
            }
            success
        }
    };

    print_status_table(&supervisor).await;
    Ok(success)
}

/// `all` expands to every configured tool; anything else is passed through
/// verbatim so an unknown name surfaces as `UnknownTool` from the supervisor.
fn select_targets(supervisor: &ProcessSupervisor, tool: &str) -> Vec<String> {
    if tool == "all" {
        supervisor
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.name.clone())
            .collect()
    } else {
        vec![tool.to_string()]
    }
}

async fn print_status_table(supervisor: &ProcessSupervisor) {
    println!();
    println!("Tool server status:");
    println!("-------------------");
    for status in supervisor.statuses().await {
        print_status(&status);
    }
}

fn print_status(status: &ToolStatus) {
    println!(
        "{} (port {}): {}",
        status.name.to_uppercase(),
        status.port,
        status.state.as_str().to_uppercase()
    );
    if status.state == ToolState::Running {
        if let Some(pid) = status.pid {
            println!("  - pid: {pid}");
        }
        println!("  - url: http://127.0.0.1:{}", status.port);
    }
    println!();
}
