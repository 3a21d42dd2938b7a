mod prompt;

use anyhow::Result;
use clap::Parser;
use console::style;
use meet_agent::{Agent, AgentResponse, Settings};
use tracing_subscriber::EnvFilter;

use prompt::{CliclackPrompt, Command};

const LIST_QUERY: &str = "List my recent Google Meet conferences";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// User id on the integration platform (overrides GOOGLE_MEET_USER_ID)
    #[arg(long)]
    user_id: Option<String>,

    /// Maximum model calls per query (overrides AGENT_MAX_TURNS)
    #[arg(long)]
    max_turns: Option<u32>,

    /// Print the authorization link instead of opening a browser
    #[arg(long)]
    no_browser: bool,

    /// Only load Google Meet tools
    #[arg(long)]
    no_drive: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Ask a single question and exit
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    prompt::welcome();

    let mut settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            prompt::render_error(&e.to_string());
            eprintln!();
            eprintln!("Set the following in your environment or a .env file:");
            eprintln!("  COMPOSIO_API_KEY   - from https://app.composio.dev");
            eprintln!("  ANTHROPIC_API_KEY  - from https://console.anthropic.com");
            std::process::exit(1);
        }
    };
    if let Some(user_id) = cli.user_id {
        settings.google_meet_user_id = user_id;
    }
    if let Some(max_turns) = cli.max_turns.filter(|n| *n > 0) {
        settings.agent_max_turns = max_turns;
    }
    if cli.no_drive {
        settings.include_drive = false;
    }

    println!("{}", style("Connecting to Google Meet...").dim());
    let agent = match Agent::setup(&settings, !cli.no_browser).await {
        Ok(agent) => agent,
        Err(e) => {
            prompt::render_error(&format!("Setup failed: {}", e));
            std::process::exit(1);
        }
    };
    println!(
        "{}",
        style(format!("Ready with {} tools.", agent.tools().len())).dim()
    );
    println!();

    if !cli.query.is_empty() {
        let query = cli.query.join(" ");
        let response = agent.query(&query, None).await;
        return show(&response);
    }

    run_session(&agent).await
}

async fn run_session(agent: &Agent) -> Result<()> {
    let mut prompt = CliclackPrompt::new();
    loop {
        let query = match prompt.get_command()? {
            Command::Empty => continue,
            Command::Help => {
                prompt::help();
                continue;
            }
            Command::Tools => {
                prompt::print_tools(&agent.list_available_tools());
                continue;
            }
            Command::Exit => break,
            Command::List => LIST_QUERY.to_string(),
            Command::Query(query) => query,
        };

        prompt.show_busy();
        let response = agent.query(&query, None).await;
        prompt.hide_busy();
        show(&response)?;
    }

    println!("Goodbye!");
    Ok(())
}

fn show(response: &AgentResponse) -> Result<()> {
    match (&response.data, &response.error) {
        (Some(data), _) if response.success => prompt::render(data),
        (_, Some(error)) => {
            prompt::render_error(error);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
