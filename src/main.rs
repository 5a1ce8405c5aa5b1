// ABOUTME: CLI entry point: thread management commands and an interactive chat loop.
// ABOUTME: Initializes logging and config, then drives the processor from the terminal.

mod config;
mod console;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use console::ConsoleObserver;
use parley_core::{
    composer, AgentProvider, AgentRegistry, CancellationRegistry, Processor, ThreadStore,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "parley", about = "Persistent agent conversations in your terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new thread
    New {
        name: String,
        /// Agent to bind the thread to
        #[arg(long)]
        agent: Option<String>,
    },
    /// List threads
    List,
    /// Open a thread and chat interactively
    Chat { thread: String },
    /// Rename a thread
    Rename { thread: String, new_name: String },
    /// Remove a thread from the listing (its history stays on disk)
    Delete { thread: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,parley=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::load()?;
    let store = ThreadStore::new(config.data_dir()?)?;

    match Cli::parse().command {
        Command::New { name, agent } => {
            let agent = agent.unwrap_or_else(|| config.default_agent.clone());
            let thread = store.create(&name, &agent)?;
            println!("{}  {} ({})", thread.id, thread.name, thread.agent);
        }
        Command::List => {
            for summary in store.list()? {
                println!("{}  {} ({})", summary.id, summary.name, summary.agent);
            }
        }
        Command::Chat { thread } => {
            let thread_id = resolve_thread(&store, &thread)?;
            chat(store, &thread_id).await?;
        }
        Command::Rename { thread, new_name } => {
            let thread_id = resolve_thread(&store, &thread)?;
            store.rename(&thread_id, &new_name)?;
        }
        Command::Delete { thread } => {
            let thread_id = resolve_thread(&store, &thread)?;
            store.remove_from_index(&thread_id)?;
        }
    }
    Ok(())
}

/// Accept a thread id or a unique thread name.
fn resolve_thread(store: &ThreadStore, needle: &str) -> Result<String> {
    let summaries = store.list()?;
    if summaries.iter().any(|s| s.id == needle) {
        return Ok(needle.to_string());
    }
    let matches: Vec<_> = summaries.iter().filter(|s| s.name == needle).collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => bail!("No thread named '{}'", needle),
        _ => bail!("Multiple threads named '{}'; use the id", needle),
    }
}

async fn chat(store: ThreadStore, thread_id: &str) -> Result<()> {
    let cancel = Arc::new(CancellationRegistry::new());
    let processor = Processor::new(
        store.clone(),
        Arc::new(AgentProvider::new(AgentRegistry::default())),
        Arc::clone(&cancel),
        Arc::new(ConsoleObserver),
    );

    let thread = store.load(thread_id)?;
    for message in &thread.messages {
        if !message.is_marker() {
            println!("{}", message.text);
        }
    }
    processor.open_thread(thread_id).await?;

    println!("(/retry regenerates the last answer, /quit exits, Ctrl+C stops a stream)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/retry" => {
                let thread = store.load(thread_id)?;
                let Some(last_user) = thread.last_user_message().map(|m| m.text.clone()) else {
                    println!("Nothing to retry yet");
                    continue;
                };
                store.remove_after_last_user(thread_id)?;
                let thread = store.load(thread_id)?;
                let task = composer::build_task(&last_user, &thread, None);
                run_interruptible(&processor, &cancel, thread_id, task).await;
            }
            text => {
                let thread = composer::add_user_message(&store, thread_id, text)?;
                let task = composer::build_task(text, &thread, None);
                run_interruptible(&processor, &cancel, thread_id, task).await;
            }
        }
    }
    Ok(())
}

/// Run one task; Ctrl+C requests a cooperative stop instead of killing
/// the process, and the task still runs to its (shortened) completion.
async fn run_interruptible(
    processor: &Processor,
    cancel: &Arc<CancellationRegistry>,
    thread_id: &str,
    task: parley_core::Task,
) {
    let handle = processor.handle(thread_id, task);
    tokio::pin!(handle);
    loop {
        tokio::select! {
            outcome = &mut handle => {
                if outcome.is_failed() {
                    tracing::debug!(thread_id = %thread_id, "Task ended in failure");
                }
                return;
            }
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    cancel.request_stop(thread_id);
                }
            }
        }
    }
}
