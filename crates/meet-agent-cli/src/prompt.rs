use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, spinner};
use console::style;
use meet_agent::catalog::ToolSummary;
use std::io;

/// What the user asked for at the prompt
#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Tools,
    List,
    Exit,
    Query(String),
    Empty,
}

/// Reserved words win over free text, compared case-insensitively
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "help" => Command::Help,
        "tools" => Command::Tools,
        "list" => Command::List,
        "quit" | "exit" | "q" => Command::Exit,
        _ => Command::Query(line.to_string()),
    }
}

fn is_exit_signal(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::UnexpectedEof
    )
}

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt { spinner: spinner() }
    }

    /// Ctrl-C, Esc and end of input leave the session like `quit`
    pub fn get_command(&mut self) -> Result<Command> {
        let line: io::Result<String> = input("You:").placeholder("").required(false).interact();
        match line {
            Ok(line) => Ok(parse_command(&line)),
            Err(e) if is_exit_signal(&e) => Ok(Command::Exit),
            Err(e) => Err(e.into()),
        }
    }

    pub fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("Thinking...");
    }

    pub fn hide_busy(&self) {
        self.spinner.stop("");
    }
}

pub fn welcome() {
    println!();
    println!("{}", style("Google Meet Agent").bold().cyan());
    println!(
        "Ask questions about your past meetings {}",
        style("- type \"help\" for commands, \"quit\" to exit").dim()
    );
    println!();
}

pub fn help() {
    println!("Commands:");
    println!("  help   - Show this help message");
    println!("  tools  - List the tools available to the agent");
    println!("  list   - List your recent Google Meet conferences");
    println!("  quit   - Exit (also: exit, q)");
    println!();
    println!("Anything else is sent to the agent, for example:");
    println!("  What meetings did I have last week?");
    println!("  Who attended the meeting with code abc-defg-hij?");
    println!("  Summarize the transcript from my last meeting");
    println!();
}

pub fn print_tools(tools: &[ToolSummary]) {
    println!("Available tools ({}):", tools.len());
    for tool in tools {
        println!("  {} {}", style(&tool.name).green(), style(&tool.description).dim());
    }
    println!();
}

/// Render the agent's answer as markdown
pub fn render(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme("zenburn")
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()?;
    println!();
    Ok(())
}

pub fn render_error(message: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), message);
}
