//! Startup helpers for the interactive `IntellBee` client.
//!
//! Reads commands from stdin, one per line. Anything that is not a command
//! is sent as a chat message.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::conversation::store::SessionSnapshot;
use crate::core::config::ClientConfig;
use crate::core::errors::{ClientError, ClientResult};
use crate::core::ids::ConversationId;
use crate::core::message::{Attachment, AttachmentKind, Role};
use crate::dispatch::{DispatchOutcome, MessageDispatcher, NarrationSettings};
use crate::transport::HttpTransport;
use crate::voice::catalog::{StaticVoiceSource, VoiceCatalog};
use crate::voice::speech::{SpeechController, TracingSpeechEngine};
use crate::voice::types::VoiceGender;

const HELP: &str = "\
/new                    start a new conversation
/list                   list conversations
/select <id>            switch conversation
/voice on|off           toggle narration
/lang <tag>             set reply language (e.g. ta-IN)
/gender male|female     set narration voice gender
/image <path> [text]    send an image
/audio <path> [text]    send an audio clip
/logout                 clear the session
/quit                   exit";

/// One line of user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Send plain text.
    Send(String),
    /// Start a draft conversation.
    New,
    /// Print the conversation list.
    List,
    /// Activate a conversation.
    Select(ConversationId),
    /// Toggle narration.
    Narration(bool),
    /// Change the reply language.
    Language(String),
    /// Change the narration voice gender.
    Gender(VoiceGender),
    /// Send a file with optional text.
    Attach {
        /// Image or audio.
        kind: AttachmentKind,
        /// File to read.
        path: PathBuf,
        /// Accompanying text.
        text: String,
    },
    /// Clear the session.
    Logout,
    /// Print usage.
    Help,
    /// Exit the loop.
    Quit,
}

/// Parse one input line.
///
/// # Errors
/// Returns an error for unknown commands or missing arguments.
pub fn parse_command(line: &str) -> anyhow::Result<Command> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Send(line.to_string()));
    };

    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();

    let command = match name {
        "new" => Command::New,
        "list" => Command::List,
        "select" if !args.is_empty() => Command::Select(ConversationId::new(args)),
        "voice" => match args {
            "on" => Command::Narration(true),
            "off" => Command::Narration(false),
            _ => bail!("usage: /voice on|off"),
        },
        "lang" if !args.is_empty() => Command::Language(args.to_string()),
        "gender" => Command::Gender(args.parse()?),
        "image" | "audio" if args.is_empty() => bail!("usage: /{name} <path> [text]"),
        "image" | "audio" => {
            let kind = if name == "image" {
                AttachmentKind::Image
            } else {
                AttachmentKind::Audio
            };
            let (path, text) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
            Command::Attach {
                kind,
                path: PathBuf::from(path),
                text: text.trim().to_string(),
            }
        }
        "logout" => Command::Logout,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => bail!("unknown command /{name}, try /help"),
    };
    Ok(command)
}

/// Guess a MIME type from the file extension, falling back to the kind's
/// default.
#[must_use]
pub fn guess_mime(kind: AttachmentKind, path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        _ => kind.default_mime(),
    }
}

/// Wire the production transport, catalog and speech engine together.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built or a hint pattern is
/// invalid.
pub fn build_dispatcher(config: &ClientConfig) -> ClientResult<MessageDispatcher> {
    let transport = Arc::new(HttpTransport::new(config)?);
    let source = Arc::new(StaticVoiceSource::new(config.voices.clone()));
    let catalog = Arc::new(VoiceCatalog::new(source));
    let speech = Arc::new(SpeechController::new(
        Arc::new(TracingSpeechEngine),
        catalog,
        config.gender_hints()?,
        config.speech.clone(),
    ));
    Ok(MessageDispatcher::new(
        transport,
        speech,
        NarrationSettings::from(config),
    ))
}

/// Run the client until stdin closes or `/quit`.
///
/// # Returns
/// `ExitCode::SUCCESS` on a clean exit, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting IntellBee client v{}", env!("CARGO_PKG_VERSION"));

    let config = match ClientConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!("Chat service: {}", config.api_base_url);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(run_session(&config)) {
        tracing::error!("Client error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

async fn run_session(config: &ClientConfig) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(config).context("failed to build client")?;
    let mut out = std::io::stdout();

    match dispatcher.load_history().await {
        Ok(count) => writeln!(out, "{count} conversation(s) loaded. /help for commands.")?,
        Err(e) => writeln!(out, "History unavailable ({e}). /help for commands.")?,
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(c) => c,
            Err(e) => {
                writeln!(out, "{e}")?;
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        execute(&dispatcher, command, &mut out).await?;
    }

    dispatcher.speech().stop();
    Ok(())
}

async fn execute(
    dispatcher: &MessageDispatcher,
    command: Command,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Send(text) => {
            let outcome = dispatcher.send_text(text).await;
            render_outcome(dispatcher, outcome, out).await?;
        }
        Command::Attach { kind, path, text } => {
            let data = match tokio::fs::read(&path).await {
                Ok(d) => d,
                Err(e) => {
                    writeln!(out, "Cannot read {}: {e}", path.display())?;
                    return Ok(());
                }
            };
            let file_name = path
                .file_name()
                .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
            let attachment =
                Attachment::new(kind, file_name, data).with_mime_type(guess_mime(kind, &path));
            let outcome = dispatcher.send_attachment(text, attachment).await;
            render_outcome(dispatcher, outcome, out).await?;
        }
        Command::New => {
            dispatcher.start_new_conversation().await;
            writeln!(out, "New conversation.")?;
        }
        Command::List => render_list(&dispatcher.snapshot().await, out)?,
        Command::Select(id) => {
            if dispatcher.select_conversation(&id).await {
                render_transcript(&dispatcher.snapshot().await, out)?;
            } else {
                writeln!(out, "No conversation {id}.")?;
            }
        }
        Command::Narration(enabled) => {
            dispatcher.set_narration_enabled(enabled).await;
            writeln!(out, "Narration {}.", if enabled { "on" } else { "off" })?;
        }
        Command::Language(lang) => {
            drop(dispatcher.set_language(lang.clone()).await);
            writeln!(out, "Language set to {lang}.")?;
        }
        Command::Gender(gender) => {
            drop(dispatcher.set_voice_gender(gender).await);
            writeln!(out, "Voice gender set to {gender}.")?;
        }
        Command::Logout => {
            dispatcher.sign_out().await;
            writeln!(out, "Signed out.")?;
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => {}
    }
    Ok(())
}

async fn render_outcome(
    dispatcher: &MessageDispatcher,
    outcome: ClientResult<DispatchOutcome>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match outcome {
        Ok(DispatchOutcome::Skipped) => {}
        Ok(
            DispatchOutcome::Replaced { .. }
            | DispatchOutcome::Appended { .. }
            | DispatchOutcome::TransportFailed(_),
        ) => {
            let handle = dispatcher.store();
            let store = handle.read().await;
            if let Some(reply) = store.latest_assistant_message() {
                writeln!(out, "bot> {}", reply.content)?;
            }
        }
        Ok(DispatchOutcome::ServiceError(notice)) => writeln!(out, "! {notice}")?,
        Ok(DispatchOutcome::Ambiguous) => writeln!(out, "! The service sent an empty response.")?,
        Ok(DispatchOutcome::Discarded) => {
            writeln!(out, "! Reply dropped: the conversation changed.")?;
        }
        Err(ClientError::DispatchInFlight) => {
            writeln!(out, "! Still waiting for the previous reply.")?;
        }
        Err(e) => writeln!(out, "! {e}")?,
    }
    Ok(())
}

fn render_list(snapshot: &SessionSnapshot, out: &mut impl Write) -> anyhow::Result<()> {
    if snapshot.conversations.is_empty() {
        writeln!(out, "No conversations yet.")?;
    }
    for conversation in &snapshot.conversations {
        let marker = if snapshot.active_id.as_ref() == Some(&conversation.id) {
            '*'
        } else {
            ' '
        };
        let created = conversation
            .created_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{marker} {}  {}  {created}",
            conversation.id,
            conversation.display_title()
        )?;
    }
    Ok(())
}

fn render_transcript(snapshot: &SessionSnapshot, out: &mut impl Write) -> anyhow::Result<()> {
    for message in &snapshot.transcript {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "bot",
        };
        writeln!(out, "{who}> {}", message.content)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{Conversation, Message};

    #[test]
    fn test_plain_text_is_sent() {
        assert!(matches!(
            parse_command("  hello there "),
            Ok(Command::Send(ref t)) if t == "hello there"
        ));
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse_command("/new"), Ok(Command::New)));
        assert!(matches!(parse_command("/voice off"), Ok(Command::Narration(false))));
        assert!(matches!(
            parse_command("/gender male"),
            Ok(Command::Gender(VoiceGender::Male))
        ));
        assert!(matches!(
            parse_command("/select chat_3"),
            Ok(Command::Select(ref id)) if id.as_str() == "chat_3"
        ));
        assert!(matches!(
            parse_command("/lang ta-IN"),
            Ok(Command::Language(ref l)) if l == "ta-IN"
        ));
        assert!(matches!(parse_command("/quit"), Ok(Command::Quit)));
    }

    #[test]
    fn test_parse_attachment_with_text() {
        let parsed = parse_command("/image ./cat.png what is this?");
        assert!(matches!(
            parsed,
            Ok(Command::Attach { kind: AttachmentKind::Image, ref path, ref text })
                if path == Path::new("./cat.png") && text == "what is this?"
        ));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("/select").is_err());
        assert!(parse_command("/voice maybe").is_err());
        assert!(parse_command("/gender robot").is_err());
        assert!(parse_command("/dance").is_err());
    }

    #[test]
    fn test_attachment_commands_need_a_path() {
        let err = parse_command("/image").unwrap_err();
        assert_eq!(err.to_string(), "usage: /image <path> [text]");
        let err = parse_command("/audio   ").unwrap_err();
        assert_eq!(err.to_string(), "usage: /audio <path> [text]");
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(AttachmentKind::Image, Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_mime(AttachmentKind::Audio, Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(guess_mime(AttachmentKind::Audio, Path::new("clip")), "audio/webm");
        assert_eq!(guess_mime(AttachmentKind::Image, Path::new("x.bin")), "image/png");
    }

    #[test]
    fn test_render_list_marks_active() {
        let snapshot = SessionSnapshot {
            conversations: vec![
                Conversation {
                    id: ConversationId::new("chat_1"),
                    title: "Trip".to_string(),
                    created_at: None,
                    messages: Vec::new(),
                },
                Conversation {
                    id: ConversationId::new("chat_0"),
                    title: "Recipes".to_string(),
                    created_at: None,
                    messages: vec![Message::user("hi")],
                },
            ],
            active_id: Some(ConversationId::new("chat_1")),
            transcript: Vec::new(),
            pending: false,
        };
        let mut buf = Vec::new();
        assert!(render_list(&snapshot, &mut buf).is_ok());
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("* chat_1  Trip"));
        assert!(text.contains("  chat_0  Recipes"));
    }
}
