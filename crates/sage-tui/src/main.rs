use std::path::PathBuf;
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sage_core::{
    split_thought, Attachment, Category, CategoryContext, ChatRole, CompletionClient, Config,
    Conversation, Dispatcher, SubmitOutcome, ERROR_MESSAGE,
};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, TICK_RATE};

#[derive(Parser)]
#[command(name = "sage")]
#[command(version, about = "Category-scoped AI chat with file, web search, and voice prompts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the reply
    Ask {
        /// Your question
        prompt: String,
        /// Category to ask under (defaults to the saved one)
        #[arg(short, long)]
        category: Option<String>,
        /// Attach an image
        #[arg(long, conflicts_with = "pdf")]
        image: Option<PathBuf>,
        /// Attach a PDF
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Answer from a web search
        #[arg(short, long)]
        search: bool,
        /// Ask about a research paper instead
        #[arg(long, conflicts_with_all = ["image", "pdf", "search"])]
        paper: Option<String>,
        /// Print the model's reasoning as well
        #[arg(long)]
        show_thought: bool,
    },
    /// List the available categories
    Categories,
    /// Remove every uploaded document from the server
    Nuke,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Hold the guard until exit so buffered log lines are flushed
    let _log_guard = match logging::init_tracing() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: file logging disabled: {}", e);
            None
        }
    };

    let config = Config::load()?;

    match cli.command {
        None => run_tui(&config).await,
        Some(Commands::Ask {
            prompt,
            category,
            image,
            pdf,
            search,
            paper,
            show_thought,
        }) => {
            let file = match (image, pdf) {
                (Some(path), _) => Some((path, FileFlag::Image)),
                (None, Some(path)) => Some((path, FileFlag::Pdf)),
                (None, None) => None,
            };
            ask(&config, &prompt, category.as_deref(), file, search, paper.as_deref(), show_thought).await
        }
        Some(Commands::Categories) => {
            list_categories(&config);
            Ok(())
        }
        Some(Commands::Nuke) => nuke(&config).await,
    }
}

async fn run_tui(config: &Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut app = App::new(config);
    let result = run_app(&mut terminal, &mut app).await;

    tui::restore()?;
    result
}

async fn run_app(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;

        // Settle a finished request without blocking the loop
        if app.dispatcher.poll().await {
            app.scroll_to_bottom();
        }
        app.poll_clear_documents().await;
    }

    Ok(())
}

/// Which attach flag was given, so the file can be checked against it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFlag {
    Image,
    Pdf,
}

fn check_attachment_kind(attachment: &Attachment, flag: FileFlag) -> Result<()> {
    let name = attachment
        .file()
        .map(|f| f.file_name.clone())
        .unwrap_or_default();

    match (flag, attachment) {
        (FileFlag::Image, Attachment::Image(_)) | (FileFlag::Pdf, Attachment::Pdf(_)) => Ok(()),
        (FileFlag::Image, _) => bail!("{} is not an image; attach it with --pdf", name),
        (FileFlag::Pdf, _) => bail!("{} is not a PDF; attach it with --image", name),
    }
}

/// The reply to the last submission, or an error if the request failed
fn settled_reply(conversation: &Conversation) -> Result<String> {
    match conversation.last() {
        Some(msg) if msg.role == ChatRole::Assistant && msg.content == ERROR_MESSAGE => {
            bail!("{} (details in {})", ERROR_MESSAGE, log_location())
        }
        Some(msg) if msg.role == ChatRole::Assistant => Ok(msg.content.clone()),
        _ => bail!("No reply was received"),
    }
}

fn log_location() -> String {
    logging::log_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|_| "the log file".to_string())
}

async fn ask(
    config: &Config,
    prompt: &str,
    category: Option<&str>,
    file: Option<(PathBuf, FileFlag)>,
    search: bool,
    paper: Option<&str>,
    show_thought: bool,
) -> Result<()> {
    let category = match category {
        Some(name) => match Category::from_str(name) {
            Some(category) => category,
            None => bail!("Unknown category '{}'. Run `sage categories` to list them.", name),
        },
        None => config.category(),
    };

    let mut dispatcher = Dispatcher::from_config(config, CategoryContext::new(category));
    if let Some((path, flag)) = file {
        dispatcher.select_file(&path).await?;
        check_attachment_kind(dispatcher.attachment(), flag)?;
    }
    if search {
        dispatcher.toggle_web_search();
    }

    let outcome = match paper {
        Some(paper) => {
            let outcome = dispatcher.submit_paper(prompt, paper);
            dispatcher.wait().await;
            outcome
        }
        None => dispatcher.submit_and_wait(prompt).await,
    };

    if outcome != SubmitOutcome::Submitted {
        bail!("Nothing to send: give a prompt or attach a file");
    }

    let reply = settled_reply(dispatcher.conversation())?;
    let split = split_thought(&reply);
    if show_thought {
        if let Some(thought) = split.thought {
            println!("Thought process:");
            for line in thought.lines() {
                println!("  {}", line);
            }
            println!();
        }
    }
    println!("{}", split.main);

    Ok(())
}

fn list_categories(config: &Config) {
    let current = config.category();
    for category in Category::all() {
        let marker = if category == current { "*" } else { " " };
        println!("{} {:<10} {}", marker, category.as_str(), category.display_name());
    }
}

async fn nuke(config: &Config) -> Result<()> {
    let client = CompletionClient::new(&config.api_settings()?)?;
    client.clear_documents().await?;
    println!("Uploaded documents cleared from {}", client.base_url());
    Ok(())
}
