//! Interactive chat application with threads and streaming replies.
//!
//! This binary provides a streaming REPL interface for chatting with models
//! behind an OpenAI-compatible completion endpoint such as OpenRouter.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage; the key comes from OPENROUTER_API_KEY
//! threadchat
//!
//! # Specify a model
//! threadchat --model openai/gpt-4o-mini
//!
//! # Load settings from a YAML file and skip reasoning
//! threadchat --config threadchat.yaml --no-reasoning
//!
//! # Show diagnostics on stderr
//! THREADCHAT_LOG=threadchat=debug threadchat
//! ```
//!
//! # Commands
//!
//! While chatting, type `/help` for the list of slash commands.  Ctrl-C while
//! a reply is streaming stops the reply and keeps what has arrived so far.

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use threadchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, Orchestrator, PlainTextRenderer, Renderer, TurnOutcome,
    help_text, parse_command,
};
use threadchat::{CompletionBackend, CompletionClient, KnownModel, Role};

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "THREADCHAT_LOG";

/// Main entry point for the threadchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let (args, _) = ChatArgs::from_command_line_relaxed("threadchat [OPTIONS]");
    let config = ChatConfig::resolve(args, |name| std::env::var(name).ok())?;
    let use_color = config.use_color;

    let client = CompletionClient::from_config(&config)?;
    let mut orchestrator = Orchestrator::new(client, config)?;
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Ctrl-C during a reply cancels it; at the prompt rustyline handles it.
    let canceller = orchestrator.canceller();
    ctrlc::set_handler(move || {
        canceller.cancel();
    })?;

    println!("threadchat (model: {})", orchestrator.model());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let prompt = format!("[{}] You: ", orchestrator.current_thread());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    if !run_command(cmd, &mut orchestrator, &mut renderer).await {
                        println!("Goodbye!");
                        break;
                    }
                    continue;
                }

                println!("Assistant:");
                report(orchestrator.submit(line, &mut renderer).await, &mut renderer);
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true),
    );
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Execute a slash command.  Returns false when the application should exit.
async fn run_command<B: CompletionBackend>(
    cmd: ChatCommand,
    orchestrator: &mut Orchestrator<B>,
    renderer: &mut PlainTextRenderer,
) -> bool {
    match cmd {
        ChatCommand::Quit => return false,
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::NewThread => match orchestrator.new_thread() {
            Ok(name) => renderer.print_info(&format!("Started thread: {name}")),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Threads => {
            let current = orchestrator.current_thread().to_string();
            for name in orchestrator.thread_names() {
                let marker = if name == current { "*" } else { " " };
                println!("    {marker} {name}");
            }
        }
        ChatCommand::SwitchThread(name) => match orchestrator.switch_thread(&name) {
            Ok(()) => renderer.print_info(&format!("Switched to thread: {name}")),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::DeleteThread => match orchestrator.delete_thread() {
            Ok(name) => renderer.print_info(&format!(
                "Deleted thread {name}; now in {}",
                orchestrator.current_thread()
            )),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::History => print_history(orchestrator),
        ChatCommand::Edit { index, text } => {
            println!("Assistant:");
            let outcome = orchestrator.edit_user_message(index, &text, renderer).await;
            report(outcome, renderer);
        }
        ChatCommand::EditReply { index, text } => {
            match orchestrator.edit_assistant_message(index, &text) {
                Ok(()) => renderer.print_info(&format!("Reply {} updated.", index + 1)),
                Err(err) => renderer.print_error(&err.to_string()),
            }
        }
        ChatCommand::Delete(index) => match orchestrator.delete_message(index) {
            Ok(removed) => renderer.print_info(&format!("Deleted {} message(s).", removed.len())),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Model(model_name) => match orchestrator.set_model(model_name.as_str()) {
            Ok(()) => {
                let model = orchestrator.model();
                if model.is_known() {
                    renderer.print_info(&format!("Model changed to: {model}"));
                } else {
                    renderer.print_info(&format!("Model changed to: {model} (not a known model)"));
                }
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Models => {
            let current = orchestrator.model().as_str().to_string();
            for model in KnownModel::ALL {
                let marker = if model.as_str() == current { "*" } else { " " };
                println!("    {marker} {model}");
            }
        }
        ChatCommand::Reasoning(enabled) => {
            orchestrator.set_include_reasoning(enabled);
            if enabled {
                renderer.print_info("Reasoning requested.");
            } else {
                renderer.print_info("Reasoning not requested.");
            }
        }
        ChatCommand::SaveTranscript(path) => match orchestrator.save_transcript_to(&path) {
            Ok(()) => renderer.print_info(&format!("Transcript saved to {}", path)),
            Err(err) => renderer.print_error(&format!("Failed to save transcript: {}", err)),
        },
        ChatCommand::LoadTranscript(path) => match orchestrator.load_transcript_from(&path) {
            Ok(()) => renderer.print_info(&format!("Transcript loaded from {}", path)),
            Err(err) => renderer.print_error(&format!("Failed to load transcript: {}", err)),
        },
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn report(outcome: threadchat::Result<TurnOutcome>, renderer: &mut PlainTextRenderer) {
    // Turn failures have already been rendered; only rejections remain.
    if let Err(err) = outcome {
        renderer.print_error(&err.to_string());
    }
}

fn print_history<B: CompletionBackend>(orchestrator: &Orchestrator<B>) {
    let messages = orchestrator.conversation().messages();
    if messages.is_empty() {
        println!("    (no messages)");
        return;
    }
    for (i, message) in messages.iter().enumerate() {
        let label = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!("    [{}] {label}:", i + 1);
        if let Some(reasoning) = message.reasoning.as_deref().filter(|r| !r.is_empty()) {
            for line in reasoning.lines() {
                println!("        (reasoning) {line}");
            }
        }
        for line in message.text().lines() {
            println!("        {line}");
        }
    }
}
