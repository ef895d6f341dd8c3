//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage threads and messages without sending anything
//! to the API.  Message numbers are 1-based as printed by `/history`; the
//! parsed commands carry 0-based indices.

/// A parsed chat command.
///
/// These commands control the chat application and are not sent to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start a new thread.
    NewThread,

    /// List threads.
    Threads,

    /// Switch to the named thread.
    SwitchThread(String),

    /// Delete the current thread.
    DeleteThread,

    /// Replace the message at the index and regenerate from there.
    Edit {
        /// 0-based message index.
        index: usize,
        /// Replacement text.
        text: String,
    },

    /// Overwrite the assistant reply at the index.
    EditReply {
        /// 0-based message index.
        index: usize,
        /// Replacement text.
        text: String,
    },

    /// Delete the message at the index.
    Delete(usize),

    /// Change the model.
    Model(String),

    /// List the known models.
    Models,

    /// Request or stop requesting reasoning.
    Reasoning(bool),

    /// Print the conversation of the current thread.
    History,

    /// Save the transcript to a specific file immediately.
    SaveTranscript(String),

    /// Load conversation history from a file.
    LoadTranscript(String),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use threadchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model openai/gpt-4o-mini").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::NewThread,
        "threads" => ChatCommand::Threads,
        "switch" => match argument {
            Some(name) => ChatCommand::SwitchThread(name.to_string()),
            None => ChatCommand::Invalid("/switch requires a thread name".to_string()),
        },
        "delete-thread" => ChatCommand::DeleteThread,
        "edit" => parse_edit(argument, "/edit")
            .map(|(index, text)| ChatCommand::Edit { index, text })
            .unwrap_or_else(ChatCommand::Invalid),
        "edit-reply" => parse_edit(argument, "/edit-reply")
            .map(|(index, text)| ChatCommand::EditReply { index, text })
            .unwrap_or_else(ChatCommand::Invalid),
        "delete" => match argument.map(|arg| parse_number(arg, "/delete")) {
            Some(Ok(index)) => ChatCommand::Delete(index),
            Some(Err(err)) => ChatCommand::Invalid(err),
            None => ChatCommand::Invalid("/delete requires a message number".to_string()),
        },
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "models" => ChatCommand::Models,
        "reasoning" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Reasoning(value),
            None => ChatCommand::Invalid("/reasoning expects 'on' or 'off'".to_string()),
        },
        "history" => ChatCommand::History,
        "save" => match argument {
            Some(arg) => ChatCommand::SaveTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        "load" => match argument {
            Some(arg) => ChatCommand::LoadTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/load requires a file path".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_edit(argument: Option<&str>, name: &str) -> Result<(usize, String), String> {
    let Some(arg) = argument else {
        return Err(format!("{name} requires a message number and new text"));
    };
    let mut parts = arg.splitn(2, char::is_whitespace);
    let index = parse_number(parts.next().unwrap_or_default(), name)?;
    match parts.next().map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => Ok((index, text.to_string())),
        None => Err(format!("{name} requires new text after the message number")),
    }
}

fn parse_number(value: &str, name: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("{name} expects a message number from /history")),
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new thread
  /threads               List threads
  /switch <name>         Switch to another thread
  /delete-thread         Delete the current thread
  /history               Show the messages of the current thread
  /edit <n> <text>       Replace message n and regenerate from there
  /edit-reply <n> <text> Overwrite assistant reply n
  /delete <n>            Delete message n (and its reply)
  /model <name>          Change the model (e.g., /model openai/gpt-4o-mini)
  /models                List known models
  /reasoning on|off      Request reasoning from the model
  /save <file>           Save the current transcript
  /load <file>           Load a transcript into the current thread
  /help                  Show this help message
  /quit                  Exit the chat
Press Ctrl-C while a reply is streaming to stop it."#
}
