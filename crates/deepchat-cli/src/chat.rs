//! Interactive chat mode with readline support.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{Config as ReadlineConfig, Editor};
use tokio::sync::mpsc;
use tracing::debug;

use deepchat_core::{
    Generation, GenerationOutcome, GenerationRequest, Message, ThreadStore, TokenSource,
};

use crate::config::Config;
use crate::render::StreamRenderer;

/// Chat commands
enum ChatCommand {
    Quit,
    Clear,
    New(String),
    Threads,
    Title(String),
    Pin,
    Archive,
    Search(String),
    History,
    Help,
    None(String), // Regular message
}

fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return ChatCommand::None(String::new());
    }

    if !trimmed.starts_with('/') {
        return ChatCommand::None(trimmed.to_string());
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim().to_string()).unwrap_or_default();

    match cmd.as_str() {
        "/quit" | "/exit" | "/q" => ChatCommand::Quit,
        "/clear" | "/c" => ChatCommand::Clear,
        "/new" | "/n" => ChatCommand::New(arg),
        "/threads" | "/t" => ChatCommand::Threads,
        "/title" => ChatCommand::Title(arg),
        "/pin" => ChatCommand::Pin,
        "/archive" => ChatCommand::Archive,
        "/search" | "/s" => ChatCommand::Search(arg),
        "/history" | "/h" => ChatCommand::History,
        "/help" | "/?" => ChatCommand::Help,
        _ => {
            eprintln!("Unknown command: {}. Type /help for available commands.", cmd);
            ChatCommand::None(String::new())
        }
    }
}

fn print_help() {
    println!(
        r#"
Chat Commands:
  /help, /?         Show this help message
  /quit, /exit      Exit chat mode
  /new [title]      Start a new thread
  /threads, /t      List threads
  /title <title>    Rename the active thread
  /pin              Pin/unpin the active thread
  /archive          Archive/unarchive the active thread
  /search <query>   Search threads
  /history, /h      Show the active thread's messages
  /clear, /c        Clear the active thread's messages

Tips:
  - Press Ctrl+C to cancel current generation
  - Press Ctrl+D to exit
"#
    );
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Derive a thread title from the first prompt.
fn title_from_prompt(prompt: &str) -> String {
    let mut title: String = prompt.chars().take(40).collect();
    if prompt.chars().count() > 40 {
        title.push('…');
    }
    title
}

fn print_thread_list<'a>(threads: impl IntoIterator<Item = &'a deepchat_core::Thread>) {
    for thread in threads {
        let pin = if thread.is_pinned { "*" } else { " " };
        let archived = if thread.is_archived { " [archived]" } else { "" };
        println!(
            "{} {}  {} ({} messages, {}){}",
            pin,
            &thread.id[..8],
            thread.title,
            thread.messages.len(),
            format_timestamp(thread.last_updated),
            archived
        );
    }
}

/// Run interactive chat mode.
pub async fn run_chat(
    config: &Config,
    source: Arc<dyn TokenSource>,
    store: &mut ThreadStore,
) -> Result<()> {
    let readline_config = ReadlineConfig::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .build();

    let history_path = get_history_path();
    let mut rl: Editor<(), FileHistory> = Editor::with_config(readline_config)?;

    if let Some(path) = &history_path {
        let _ = rl.load_history(path);
    }

    println!("deepchat - type /help for commands, /quit to exit.\n");

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);

                match parse_command(&line) {
                    ChatCommand::Quit => break,
                    ChatCommand::Help => print_help(),
                    ChatCommand::New(title) => {
                        let title = if title.is_empty() {
                            "New chat".to_string()
                        } else {
                            title
                        };
                        let id = store.create_thread(title)?;
                        println!("Started thread {}", &id[..8]);
                    }
                    ChatCommand::Threads => print_thread_list(store.threads()),
                    ChatCommand::Title(title) => {
                        if title.is_empty() {
                            eprintln!("Usage: /title <new title>");
                        } else if let Some(id) = active_id(store) {
                            store.rename(&id, title)?;
                        }
                    }
                    ChatCommand::Pin => {
                        if let Some(id) = active_id(store) {
                            let pinned = store.toggle_pin(&id)?;
                            println!("{}", if pinned { "Pinned." } else { "Unpinned." });
                        }
                    }
                    ChatCommand::Archive => {
                        if let Some(id) = active_id(store) {
                            let archived = store.toggle_archive(&id)?;
                            println!("{}", if archived { "Archived." } else { "Unarchived." });
                        }
                    }
                    ChatCommand::Search(query) => {
                        if query.is_empty() {
                            eprintln!("Usage: /search <query>");
                        } else {
                            print_thread_list(store.search(&query).into_iter());
                        }
                    }
                    ChatCommand::History => {
                        if let Some(thread) = store.active() {
                            for message in &thread.messages {
                                println!(
                                    "[{}] {}: {}",
                                    format_timestamp(message.timestamp),
                                    message.role,
                                    message.content
                                );
                            }
                        } else {
                            println!("No active thread.");
                        }
                    }
                    ChatCommand::Clear => {
                        if let Some(id) = active_id(store) {
                            store.clear_messages(&id)?;
                            println!("Thread cleared.");
                        }
                    }
                    ChatCommand::None(message) if !message.is_empty() => {
                        generate_reply(config, source.as_ref(), store, &message).await?;
                    }
                    ChatCommand::None(_) => {}
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}

fn active_id(store: &ThreadStore) -> Option<String> {
    match store.active() {
        Some(thread) => Some(thread.id.clone()),
        None => {
            eprintln!("No active thread. Send a message or use /new first.");
            None
        }
    }
}

/// One full generation: append the user message, stream the reply through a
/// fresh hydrator, render it, and archive the final response text.
async fn generate_reply(
    config: &Config,
    source: &dyn TokenSource,
    store: &mut ThreadStore,
    prompt: &str,
) -> Result<()> {
    let thread_id = match store.active() {
        Some(thread) => thread.id.clone(),
        None => store.create_thread(title_from_prompt(prompt))?,
    };

    store.add_message(&thread_id, Message::user(prompt))?;

    let history = store
        .get(&thread_id)
        .map(|t| t.messages.clone())
        .unwrap_or_default();

    let mut request = GenerationRequest::new(history)
        .with_max_tokens(config.generation.max_tokens)
        .with_temperature(config.generation.temperature);
    if let Some(model) = &config.source.model {
        request = request.with_model(model.clone());
    }
    let cancel = request.cancel.clone();

    let stream = match source.generate(request).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Could not reach the model endpoint: {}", e);
            return Ok(());
        }
    };

    let (tx, mut rx) = mpsc::channel(64);

    let render_task = tokio::spawn(async move {
        let mut renderer = StreamRenderer::new();
        while let Some(update) = rx.recv().await {
            renderer.apply(&update);
        }
        renderer.finish();
    });

    // Ctrl+C during generation cancels this generation only.
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
        }
    });

    let outcome = Generation::new().run(stream, tx).await;
    watcher.abort();
    let _ = render_task.await;

    match outcome {
        Ok(GenerationOutcome::Complete { response, thinking }) => {
            debug!(
                thread = %thread_id,
                response_len = response.len(),
                thinking_len = thinking.len(),
                "archiving assistant message"
            );
            store.add_message(&thread_id, Message::assistant(response))?;
        }
        Ok(GenerationOutcome::Failed { message }) => {
            eprintln!("Generation failed: {}", message);
        }
        Ok(GenerationOutcome::Interrupted) => {
            println!("(generation cancelled)");
        }
        Err(e) => {
            eprintln!("Stream error: {}", e);
        }
    }

    Ok(())
}

fn get_history_path() -> Option<PathBuf> {
    let dir = dirs::data_dir()?.join("deepchat");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join("history.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepchat_core::testing::ScriptedSource;

    fn test_config() -> Config {
        Config::default()
    }

    #[tokio::test]
    async fn test_generate_reply_archives_response_only() {
        let mut store = ThreadStore::in_memory();
        let source =
            ScriptedSource::fragments(&["<think>mulling it over</think>", "final answer"]);

        generate_reply(&test_config(), &source, &mut store, "question")
            .await
            .unwrap();

        let thread = store.active().unwrap();
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.messages[0].content, "question");
        // Thinking text is never persisted.
        assert_eq!(thread.messages[1].content, "final answer");
        // Title derived from the prompt.
        assert_eq!(thread.title, "question");
    }

    #[tokio::test]
    async fn test_interrupted_generation_archives_nothing() {
        let mut store = ThreadStore::in_memory();
        let source = ScriptedSource::new(vec![Ok(deepchat_core::GenerationEvent::Token {
            text: "partial".to_string(),
        })]);

        generate_reply(&test_config(), &source, &mut store, "question")
            .await
            .unwrap();

        let thread = store.active().unwrap();
        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].content, "question");
    }

    #[tokio::test]
    async fn test_request_carries_sampling_config() {
        let mut store = ThreadStore::in_memory();
        let source = ScriptedSource::fragments(&["ok"]);

        generate_reply(&test_config(), &source, &mut store, "question")
            .await
            .unwrap();

        let requests = source.captured_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, Some(8192));
        assert_eq!(requests[0].messages.len(), 1);
    }

    #[test]
    fn test_title_from_prompt_truncates() {
        assert_eq!(title_from_prompt("short"), "short");
        let long = "x".repeat(60);
        let title = title_from_prompt(&long);
        assert_eq!(title.chars().count(), 41);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_parse_command_variants() {
        assert!(matches!(parse_command("/quit"), ChatCommand::Quit));
        assert!(matches!(parse_command("/new my chat"), ChatCommand::New(t) if t == "my chat"));
        assert!(matches!(parse_command("/search rust"), ChatCommand::Search(q) if q == "rust"));
        assert!(matches!(parse_command("hello"), ChatCommand::None(m) if m == "hello"));
        assert!(matches!(parse_command("   "), ChatCommand::None(m) if m.is_empty()));
    }
}
