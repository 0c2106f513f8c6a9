//! Stickies CLI
//!
//! Command-line interface for the stickies notes daemon.
//!
//! Commands are sent to the daemon over its loopback IPC socket, one JSON line
//! per request. `delete` and `watch` attach to a window's UI channel.

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stickies_ipc::{
    decode_line, encode_line, IpcCommand, IpcResponse, UiEvent, WindowId, DEFAULT_ADDRESS,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "stickies-cli")]
#[command(author, version, about = "Control the stickies notes daemon")]
struct Cli {
    /// Daemon IPC address
    #[arg(long, global = true, default_value = DEFAULT_ADDRESS)]
    address: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Open a note, or focus it if already open
    Open {
        /// Note name (a fresh noteN when omitted)
        name: Option<String>,
    },
    /// List all notes
    List,
    /// Delete a note (asks for confirmation)
    Delete { name: String },
    /// Rename a note
    Title { name: String, title: String },
    /// Close a window by id
    Close { window: WindowId },
    /// Set a note window's background color (#rrggbb)
    Background { window: WindowId, color: String },
    /// Print a note window's color, title and content
    Show { window: WindowId },
    /// Replace a note window's content
    Save { window: WindowId, content: String },
    /// Stream UI events of a live window
    Watch { name: String },
    /// Query daemon status
    Status,
    /// Persist everything and stop the daemon
    Quit,
}

impl Commands {
    /// The single request this command sends, for one-shot commands.
    fn to_ipc(&self) -> Option<IpcCommand> {
        let cmd = match self {
            Commands::Open { name } => IpcCommand::OpenNote { name: name.clone() },
            Commands::List => IpcCommand::ListNotes,
            Commands::Title { name, title } => IpcCommand::SetNoteTitle {
                name: name.clone(),
                title: title.clone(),
            },
            Commands::Close { window } => IpcCommand::CloseWindow { window: *window },
            Commands::Background { window, color } => IpcCommand::SetNoteBackground {
                window: *window,
                color: color.clone(),
            },
            Commands::Show { window } => IpcCommand::GetNoteData { window: *window },
            Commands::Save { window, content } => IpcCommand::SaveNoteContent {
                window: *window,
                content: content.clone(),
            },
            Commands::Status => IpcCommand::QueryStatus,
            Commands::Quit => IpcCommand::Quit,
            Commands::Delete { .. } | Commands::Watch { .. } => return None,
        };
        Some(cmd)
    }
}

/// Record name of the note list window.
const MAIN_WINDOW_NAME: &str = "mainWindow";

type LineReader = Lines<BufReader<OwnedReadHalf>>;

/// Connect to the daemon and send one command line.
async fn open_connection(address: &str, cmd: &IpcCommand) -> Result<(LineReader, OwnedWriteHalf)> {
    let stream = TcpStream::connect(address)
        .await
        .with_context(|| format!("Cannot reach daemon at {}. Is stickies running?", address))?;
    let (reader, mut writer) = stream.into_split();
    writer.write_all(encode_line(cmd)?.as_bytes()).await?;
    Ok((BufReader::new(reader).lines(), writer))
}

/// Read and parse the next line.
async fn read_message<T: serde::de::DeserializeOwned>(lines: &mut LineReader) -> Result<Option<T>> {
    match lines.next_line().await? {
        Some(line) => Ok(Some(decode_line(&line)?)),
        None => Ok(None),
    }
}

/// Send a command and wait for its response.
async fn send(address: &str, cmd: &IpcCommand) -> Result<IpcResponse> {
    let (mut lines, _writer) = open_connection(address, cmd).await?;
    read_message(&mut lines)
        .await?
        .context("Daemon closed the connection without responding")
}

/// Attach to a window's UI channel.
async fn subscribe(address: &str, name: &str) -> Result<(LineReader, OwnedWriteHalf)> {
    let cmd = IpcCommand::Subscribe {
        name: name.to_string(),
    };
    let (mut lines, writer) = open_connection(address, &cmd).await?;
    match read_message(&mut lines).await? {
        Some(IpcResponse::Subscribed { .. }) => Ok((lines, writer)),
        Some(IpcResponse::Error { message }) => bail!(message),
        Some(other) => bail!("Unexpected response: {:?}", other),
        None => bail!("Daemon closed the connection"),
    }
}

/// Human-readable form of a response.
fn format_response(response: &IpcResponse) -> String {
    match response {
        IpcResponse::Ok => "OK".to_string(),
        IpcResponse::Error { message } => format!("Error: {}", message),
        IpcResponse::Opened { name } => format!("Opened {}", name),
        IpcResponse::AlreadyOpen => "Already open, focused".to_string(),
        IpcResponse::DeleteResult { confirmed: true } => "Deleted".to_string(),
        IpcResponse::DeleteResult { confirmed: false } => "Not deleted".to_string(),
        IpcResponse::NoteList { notes } if notes.is_empty() => "No notes".to_string(),
        IpcResponse::NoteList { notes } => notes
            .iter()
            .map(|n| format!("{:<16} {}  {}", n.name, n.color, n.title))
            .collect::<Vec<_>>()
            .join("\n"),
        IpcResponse::NoteData {
            color,
            title,
            content,
        } => format!("Title:   {}\nColor:   {}\nContent: {}", title, color, content),
        IpcResponse::Subscribed { window } => format!("Subscribed to window {}", window),
        IpcResponse::Status {
            version,
            records,
            live_notes,
            windows,
            pending_confirms,
            uptime_seconds,
        } => format!(
            "stickies {}\nRecords:    {}\nOpen notes: {}\nWindows:    {}\nPrompts:    {}\nUptime:     {}s",
            version, records, live_notes, windows, pending_confirms, uptime_seconds
        ),
    }
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ask on the terminal. Anything but yes declines.
async fn prompt(title: String, message: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || -> Result<bool> {
        print!("{}: {} [y/N] ", title, message);
        std::io::stdout().flush()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        Ok(is_yes(&input))
    })
    .await?
}

/// Delete a note, answering the confirmation as the main window's UI.
async fn delete(address: &str, name: String) -> Result<()> {
    let (mut ui, mut ui_writer) = subscribe(address, MAIN_WINDOW_NAME).await?;

    let request_address = address.to_string();
    let mut request = tokio::spawn(async move {
        send(&request_address, &IpcCommand::DeleteNote { name }).await
    });

    loop {
        tokio::select! {
            result = &mut request => {
                let response = result??;
                return finish(&response);
            }
            event = read_message::<UiEvent>(&mut ui) => {
                match event? {
                    Some(UiEvent::ConfirmRequest { request_id, title, message }) => {
                        let confirmed = prompt(title, message).await?;
                        let reply = IpcCommand::ConfirmReply { request_id, confirmed };
                        ui_writer.write_all(encode_line(&reply)?.as_bytes()).await?;
                    }
                    Some(_) => {}
                    None => {
                        // Main window gone; the daemon still answers the request
                        let response = request.await??;
                        return finish(&response);
                    }
                }
            }
        }
    }
}

/// Print UI events of a window until it closes.
async fn watch(address: &str, name: String) -> Result<()> {
    let (mut ui, _writer) = subscribe(address, &name).await?;
    while let Some(event) = read_message::<UiEvent>(&mut ui).await? {
        println!("{}", serde_json::to_string(&event)?);
        if event == UiEvent::Closed {
            break;
        }
    }
    Ok(())
}

fn finish(response: &IpcResponse) -> Result<()> {
    if let IpcResponse::Error { message } = response {
        bail!("{}", message);
    }
    println!("{}", format_response(response));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Delete { name } => delete(&cli.address, name).await,
        Commands::Watch { name } => watch(&cli.address, name).await,
        command => {
            let cmd = command
                .to_ipc()
                .context("Command has no single-request form")?;
            let response = send(&cli.address, &cmd).await?;
            finish(&response)
        }
    }
}
