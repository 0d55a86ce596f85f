use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use sayr_scout::{init_tracing, AppConfig, AppContext};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

mod commands;

use commands::Input;

#[derive(Parser, Debug)]
#[command(name = "search-chat", version, about = "Chat with a search-augmented agent")]
struct Cli {
    /// TOML configuration file; environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serve the HTTP API instead of the interactive prompt.
    #[arg(long)]
    serve: bool,
    /// Override `agent.verbose`.
    #[arg(long)]
    quiet: bool,
    /// Ask a single question and exit.
    prompt: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_env_or_file(path)?,
        None => AppConfig::from_env(),
    };
    if cli.quiet {
        config.agent.verbose = false;
    }
    init_tracing(config.agent.verbose);

    let ctx = AppContext::from_config(config).await?;

    if cli.serve {
        sayr_scout::server::serve(ctx).await?;
        return Ok(());
    }

    if !cli.prompt.is_empty() {
        let answer = ctx.agent().lock().await.query(cli.prompt.join(" ")).await;
        println!("{answer}");
        ctx.shutdown().await;
        return Ok(());
    }

    repl(&ctx).await?;
    ctx.shutdown().await;
    Ok(())
}

async fn repl(ctx: &AppContext) -> Result<(), Box<dyn Error>> {
    println!("{}", commands::WELCOME);
    info!(model = %ctx.config().model.model, "interactive session started");

    let agent = ctx.agent();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!("\nGoodbye!");
            break;
        };

        match commands::parse(&line) {
            Input::Empty => continue,
            Input::Quit => {
                println!("\nGoodbye!");
                break;
            }
            Input::Clear => {
                agent.lock().await.clear_memory().await;
                println!("Conversation history cleared");
            }
            Input::Memory => {
                let summary = agent.lock().await.memory_summary();
                println!("\nConversation history:\n{summary}\n");
            }
            Input::Help => println!("\n{}\n", commands::HELP),
            Input::Unknown(command) => {
                println!("Unknown command: {command}");
                println!("Enter /help to see available commands");
            }
            Input::Question(question) => {
                let answer = agent.lock().await.query(question).await;
                println!("\nAssistant: {answer}\n");
            }
        }
    }

    Ok(())
}
