//! versebot - find, fetch and explain scripture references
//!
//! A command-line agent that spots a Bible reference in free text, looks the
//! passage up and streams an explanation from a chat-completion API.

use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use versebot::agent::{Agent, AgentEvent};
use versebot::cache::{ResultCache, SweepConfig, SweepHandle, SweepMessage};
use versebot::cli::{join_text, Cli, Command};
use versebot::config::AppConfig;
use versebot::data::{BibleClient, LlmClient};
use versebot::logging;
use versebot::reference::{BookTable, ReferenceResolver, Resolution};

type BoxError = Box<dyn Error>;

/// Builds the resolver, merging extra aliases when a books file is configured
fn build_resolver(config: &AppConfig) -> Result<ReferenceResolver, BoxError> {
    let books = match &config.books_file {
        Some(path) => BookTable::with_aliases_from_file(path)?,
        None => BookTable::default(),
    };
    Ok(ReferenceResolver::new(books))
}

fn build_cache(config: &AppConfig) -> Option<ResultCache> {
    config
        .cache
        .enabled
        .then(|| ResultCache::new(config.cache.dir.clone(), config.cache.ttl))
}

fn build_agent(config: &AppConfig) -> Result<Agent<BibleClient, LlmClient>, BoxError> {
    let resolver = build_resolver(config)?;
    let verses = BibleClient::new(&config.bible)?;
    let explainer = LlmClient::new(&config.llm)?;
    let mut agent =
        Agent::new(resolver, verses, explainer).with_translation(config.bible.translation.clone());
    if let Some(cache) = build_cache(config) {
        agent = agent.with_cache(cache);
    }
    Ok(agent)
}

/// Prints events as they arrive; returns false if the turn reported an error
async fn print_events(mut events: mpsc::Receiver<AgentEvent>) -> bool {
    let mut ok = true;
    let mut stdout = io::stdout();
    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::Greeting(text) | AgentEvent::Info(text) => println!("{text}"),
            AgentEvent::Status(text) => eprintln!("> {text}"),
            AgentEvent::VerseData(verse) => {
                debug!(reference = %verse.reference, verses = verse.verses.len(), "verse data")
            }
            AgentEvent::VerseText(text) => println!("{text}"),
            AgentEvent::ExplanationChunk(chunk) => {
                print!("{chunk}");
                let _ = stdout.flush();
            }
            AgentEvent::Error { message, code } => {
                ok = false;
                eprintln!("Error ({code}): {message}");
            }
            AgentEvent::Complete => println!(),
        }
    }
    ok
}

async fn ask(agent: &Agent<BibleClient, LlmClient>, prompt: &str) -> bool {
    let (tx, rx) = mpsc::channel(64);
    let ((), ok) = tokio::join!(agent.assist(prompt, tx), print_events(rx));
    ok
}

async fn chat(config: &AppConfig) -> Result<(), BoxError> {
    let agent = build_agent(config)?;
    let mut sweeper = build_cache(config).map(|cache| {
        SweepHandle::spawn(
            cache,
            SweepConfig {
                interval: config.cache.sweep_interval,
                enabled: true,
            },
        )
    });

    println!("Ask about any verse, e.g. \"Explain John 3:16\". Type 'quit' to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        io::stdout().flush()?;

        let line = match &mut sweeper {
            Some(handle) => tokio::select! {
                line = lines.next_line() => line?,
                Some(message) = handle.receiver.recv() => {
                    if let SweepMessage::Completed(report) = message {
                        debug!(removed = report.removed(), kept = report.kept, "background sweep");
                    }
                    println!();
                    continue;
                }
            },
            None => lines.next_line().await?,
        };

        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }
        ask(&agent, line).await;
    }

    if let Some(handle) = sweeper {
        handle.shutdown().await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode, BoxError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli)?;
    logging::init(&config.log_level)?;
    debug!(cache = ?config.cache, "configuration loaded");

    match &cli.command {
        Command::Resolve { text } => {
            let resolver = build_resolver(&config)?;
            match resolver.resolve(&join_text(text)?) {
                Resolution::Found(reference) => {
                    println!("{reference}");
                    Ok(ExitCode::SUCCESS)
                }
                Resolution::NotFound => {
                    eprintln!("No scripture reference found");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Ask { text } => {
            let prompt = join_text(text)?;
            let agent = build_agent(&config)?;
            let ok = ask(&agent, &prompt).await;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Chat => {
            chat(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sweep => {
            let cache = ResultCache::new(config.cache.dir.clone(), config.cache.ttl);
            let report = cache.sweep().await?;
            info!(dir = %cache.dir().display(), "sweep finished");
            println!(
                "kept {}, removed {} expired, {} corrupt, {} temporary",
                report.kept, report.expired_removed, report.corrupt_removed, report.temp_removed
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
