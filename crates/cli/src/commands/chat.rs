//! `sidekick chat`: Interactive or single-message chat mode.

use super::{load_config, runtime};
use sidekick_agent::{Orchestrator, RunOptions};
use sidekick_core::vector::SOURCE_KNOWLEDGE_BASE;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct ChatOptions {
    pub message: Option<String>,
    pub knowledge: Vec<PathBuf>,
    pub allow: Vec<String>,
    pub report: bool,
}

impl ChatOptions {
    fn run_options(&self) -> RunOptions {
        if self.allow.is_empty() {
            RunOptions::default()
        } else {
            RunOptions::default().with_allowed_capabilities(self.allow.iter().cloned())
        }
    }
}

/// What a line typed in interactive mode asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    Clear,
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "exit" | "quit" | "/exit" => Input::Exit,
        "/clear" => Input::Clear,
        message => Input::Message(message),
    }
}

pub async fn run(
    config_path: Option<&Path>,
    options: ChatOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = runtime::build(&config).await?;
    let orchestrator = &runtime.orchestrator;

    let mut indexed = 0;
    for path in &options.knowledge {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let chunks = orchestrator
            .memory()
            .add_document(&text, SOURCE_KNOWLEDGE_BASE)
            .await?;
        tracing::info!(path = %path.display(), chunks, "Indexed knowledge file");
        indexed += chunks;
    }

    let run_options = options.run_options();

    if let Some(msg) = &options.message {
        eprint!("  Thinking...");
        let result = answer(orchestrator, msg, &run_options, options.report).await;
        runtime.telemetry.flush();
        return result;
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Sidekick — Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:      {}", config.model.model);
    println!("  Device:     {:?}", config.context.device_tier);
    println!("  Tools:      {}", runtime.tool_count);
    println!("  Embedder:   {}", runtime.embedder);
    println!("  Knowledge:  {indexed} chunks");
    println!("  Session:    {}", runtime.session_id);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/clear' to forget this session's memory.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt_marker()?;

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Exit => break,
            Input::Clear => match orchestrator.memory().clear().await {
                Ok(()) => println!("  Memory cleared."),
                Err(e) => eprintln!("  [Error] {e}"),
            },
            Input::Message(message) => {
                eprint!("  ...");
                if let Err(e) = answer(orchestrator, message, &run_options, options.report).await {
                    eprintln!("  [Error] {e}");
                }
                println!();
            }
        }
        prompt_marker()?;
    }

    runtime.telemetry.flush();
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn answer(
    orchestrator: &Orchestrator,
    message: &str,
    options: &RunOptions,
    report: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = orchestrator.run_detailed(message, options).await;
    eprint!("\r              \r");
    let run = result?;
    for line in run.response.lines() {
        println!("  Assistant > {line}");
    }
    if report {
        println!("{}", serde_json::to_string_pretty(&run)?);
    }
    Ok(())
}

fn prompt_marker() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
