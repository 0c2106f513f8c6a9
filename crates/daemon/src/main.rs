//! Stickies Daemon
//!
//! Main process for the stickies notes app.
//!
//! Responsibilities:
//! - Load settings and the persisted note document
//! - Create the main window and reopen the notes that were open at last quit
//! - Serve IPC requests from window UIs and the CLI
//! - Own the session on a single event loop, so handlers never overlap
//! - Persist the document on every exit path

mod config;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use config::Config;
use serde::Serialize;
use stickies_core::{
    CloseOutcome, ConfigStore, OpenOutcome, Rect, Session, SessionError, MAIN_WINDOW_NAME,
};
use stickies_ipc::{
    decode_line, encode_line, IpcCommand, IpcResponse, NoteListItem, MAX_IPC_MESSAGE_SIZE,
};
use stickies_platform_virtual::{ConfirmBroker, UiSink, VirtualHost};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Events that the daemon event loop processes.
enum DaemonEvent {
    /// An IPC request from a window UI or the CLI.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// A connection asks to become the UI channel of a window.
    Subscribe {
        name: String,
        sink: UiSink,
        responder: oneshot::Sender<IpcResponse>,
    },
}

/// Whether the event loop keeps running after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Fallback line when a message cannot be serialized.
const SERIALIZATION_ERROR_LINE: &str =
    "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n";

/// Application state, owned by the event loop.
struct AppState {
    /// Document, registry and window host.
    session: Session<VirtualHost>,
    /// Daemon start time for uptime reporting.
    start_time: Instant,
}

impl AppState {
    /// Create state over a loaded store. No windows exist yet.
    fn new(config: &Config, store: ConfigStore) -> Self {
        let host = VirtualHost::new(config.platform_config());
        Self {
            session: Session::new(store, host, config.window_defaults()),
            start_time: Instant::now(),
        }
    }

    /// Create the main window and reopen the notes left open at last quit.
    fn start(&mut self) -> Result<(), SessionError> {
        self.session.init_main_window()?;
        let restored = self.session.restore_open_notes()?;
        if !restored.is_empty() {
            debug!("Reopened notes: {}", restored.join(", "));
        }
        Ok(())
    }

    /// Persist the document before exit.
    fn shutdown(&mut self) -> Result<(), SessionError> {
        self.session.quit()
    }

    /// Handle an IPC command and return the response.
    async fn handle_command(&mut self, cmd: IpcCommand) -> (IpcResponse, Flow) {
        debug!("Handling {:?}", cmd);

        match cmd {
            IpcCommand::OpenNote { name } => {
                let response = reply(self.session.open_or_focus(name), |outcome| match outcome {
                    OpenOutcome::Opened(name) => IpcResponse::Opened { name },
                    OpenOutcome::AlreadyOpen => IpcResponse::AlreadyOpen,
                });
                (response, Flow::Continue)
            }
            IpcCommand::DeleteNote { name } => {
                let result = self.session.delete_note(&name).await;
                let response = reply(result, |confirmed| IpcResponse::DeleteResult { confirmed });
                (response, Flow::Continue)
            }
            IpcCommand::ListNotes => {
                let notes = self
                    .session
                    .list_notes()
                    .into_iter()
                    .map(|note| NoteListItem {
                        name: note.name,
                        title: note.title,
                        color: note.color,
                    })
                    .collect();
                (IpcResponse::NoteList { notes }, Flow::Continue)
            }
            IpcCommand::GetNoteData { window } => {
                let response = reply(self.session.snapshot(window), |note| IpcResponse::NoteData {
                    color: note.color,
                    title: note.title,
                    content: note.content,
                });
                (response, Flow::Continue)
            }
            IpcCommand::SaveNoteContent { window, content } => {
                let response = reply(self.session.save_content(window, content), |()| {
                    IpcResponse::Ok
                });
                (response, Flow::Continue)
            }
            IpcCommand::SetNoteBackground { window, color } => {
                if !config::is_hex_color(&color) {
                    warn!("Rejected background '{}' for window {}", color, window);
                    let response =
                        IpcResponse::error(format!("Invalid color '{}', expected #rrggbb", color));
                    return (response, Flow::Continue);
                }
                let response = reply(self.session.set_background(window, &color), |()| {
                    IpcResponse::Ok
                });
                (response, Flow::Continue)
            }
            IpcCommand::CloseWindow { window } => match self.session.close_or_hide(window) {
                Ok(CloseOutcome::LastWindowClosed) => {
                    info!("All windows closed, quitting");
                    (IpcResponse::Ok, Flow::Quit)
                }
                Ok(_) => (IpcResponse::Ok, Flow::Continue),
                Err(e) => (error_response(e), Flow::Continue),
            },
            IpcCommand::Quit => {
                info!("Quit requested");
                (IpcResponse::Ok, Flow::Quit)
            }
            IpcCommand::SetNoteTitle { name, title } => {
                let response = reply(self.session.set_title(&title, &name), |()| IpcResponse::Ok);
                (response, Flow::Continue)
            }
            IpcCommand::ReportGeometry { window, rect } => {
                let rect = Rect::new(rect.x, rect.y, rect.width, rect.height);
                let response = match self.session.host_mut().report_geometry(window, rect) {
                    Ok(true) => reply(self.session.persist_geometry(window), |()| IpcResponse::Ok),
                    Ok(false) => IpcResponse::Ok,
                    Err(e) => IpcResponse::error(e.to_string()),
                };
                (response, Flow::Continue)
            }
            IpcCommand::ReadyToShow { window } => {
                let response = match self.session.host_mut().ready_to_show(window) {
                    Ok(revealed) => {
                        if revealed {
                            debug!("Window {} revealed on first paint", window);
                        }
                        IpcResponse::Ok
                    }
                    Err(e) => IpcResponse::error(e.to_string()),
                };
                (response, Flow::Continue)
            }
            IpcCommand::QueryStatus => {
                let response = IpcResponse::Status {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    records: self.session.store().document().windows.len(),
                    live_notes: self.session.registry().len(),
                    windows: self.session.host().window_count(),
                    pending_confirms: self.session.host().confirm_broker().pending(),
                    uptime_seconds: self.start_time.elapsed().as_secs(),
                };
                (response, Flow::Continue)
            }
            // Handled on the connection before it reaches the loop
            IpcCommand::Subscribe { .. } | IpcCommand::ConfirmReply { .. } => (
                IpcResponse::error("Command must be sent on its own connection"),
                Flow::Continue,
            ),
        }
    }

    /// Attach a UI channel to the live window named `name`.
    fn subscribe(&mut self, name: &str, sink: UiSink) -> IpcResponse {
        let window = if name == MAIN_WINDOW_NAME {
            self.session.main_window()
        } else {
            self.session.registry().resolve(name)
        };
        let Some(window) = window else {
            return IpcResponse::error(format!("No live window named '{}'", name));
        };

        match self.session.host_mut().attach_ui(window, sink) {
            Ok(_) => {
                info!(
                    "UI attached to '{}' (window {}, {} client(s))",
                    name,
                    window,
                    self.session.host().ui_count(window)
                );
                IpcResponse::Subscribed { window }
            }
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }
}

fn error_response(e: SessionError) -> IpcResponse {
    warn!("Request failed: {}", e);
    IpcResponse::error(e.to_string())
}

fn reply<T>(result: Result<T, SessionError>, ok: impl FnOnce(T) -> IpcResponse) -> IpcResponse {
    match result {
        Ok(value) => ok(value),
        Err(e) => error_response(e),
    }
}

/// Process events until a quit or shutdown, then hand the state back for teardown.
///
/// A shutdown also cuts short a request that is still awaiting a delete
/// confirmation; that request changes nothing.
async fn run_event_loop(
    mut state: AppState,
    mut event_rx: mpsc::Receiver<DaemonEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> AppState {
    loop {
        let event = tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
            Ok(()) = shutdown.changed() => {
                info!("Shutdown requested");
                break;
            }
        };

        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                let handled = tokio::select! {
                    handled = state.handle_command(cmd) => Some(handled),
                    Ok(()) = shutdown.changed() => None,
                };
                let Some((response, flow)) = handled else {
                    info!("Shutdown requested while a request was in progress");
                    let _ = responder.send(IpcResponse::error("Daemon is shutting down"));
                    break;
                };
                if responder.send(response).is_err() {
                    debug!("Client disconnected before receiving IPC response");
                }
                if flow == Flow::Quit {
                    break;
                }
            }
            DaemonEvent::Subscribe {
                name,
                sink,
                responder,
            } => {
                let response = state.subscribe(&name, sink);
                if responder.send(response).is_err() {
                    debug!("Client disconnected before subscription completed");
                }
            }
        }
    }
    state
}

/// Run the IPC server, accepting connections and dispatching commands.
async fn run_ipc_server(
    listener: TcpListener,
    event_tx: mpsc::Sender<DaemonEvent>,
    broker: ConfirmBroker,
    read_timeout: Duration,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept client connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        debug!("Client connected from {}", peer);

        let event_tx = event_tx.clone();
        let broker = broker.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, event_tx, broker, read_timeout).await {
                warn!("Client handler error: {}", e);
            }
        });
    }
}

/// Write one message as a JSON line.
async fn write_message<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> Result<()> {
    let line = match encode_line(message) {
        Ok(line) => line,
        Err(e) => {
            warn!("Failed to serialize IPC message: {}", e);
            SERIALIZATION_ERROR_LINE.to_string()
        }
    };
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Handle a single client connection.
async fn handle_client(
    stream: TcpStream,
    event_tx: mpsc::Sender<DaemonEvent>,
    broker: ConfirmBroker,
    read_timeout: Duration,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let limited_reader = reader.take(MAX_IPC_MESSAGE_SIZE as u64);
    let mut lines = BufReader::new(limited_reader).lines();

    // Read command (single line of JSON) with timeout and size bound
    let line = match tokio::time::timeout(read_timeout, lines.next_line()).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => return Ok(()), // Client disconnected
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            // Timeout: client did not send in time, silently close
            return Ok(());
        }
    };
    debug!("Received command: {}", line.trim());

    let cmd: IpcCommand = match decode_line(&line) {
        Ok(cmd) => cmd,
        Err(e) => {
            let response = IpcResponse::error(format!("Invalid command: {}", e));
            write_message(&mut writer, &response).await?;
            return Ok(());
        }
    };

    match cmd {
        IpcCommand::ConfirmReply {
            request_id,
            confirmed,
        } => {
            let response = resolve_confirm(&broker, request_id, confirmed);
            write_message(&mut writer, &response).await?;
        }
        IpcCommand::Subscribe { name } => {
            let (sink, mut ui_rx) = mpsc::unbounded_channel();
            let (resp_tx, resp_rx) = oneshot::channel();
            let event = DaemonEvent::Subscribe {
                name,
                sink,
                responder: resp_tx,
            };
            let response = dispatch(&event_tx, event, resp_rx).await;
            let subscribed = matches!(response, IpcResponse::Subscribed { .. });
            write_message(&mut writer, &response).await?;
            if !subscribed {
                return Ok(());
            }

            // Stream UI events until the window closes or the client leaves.
            // The client may answer confirm requests and send one-way
            // requests on this same connection.
            loop {
                tokio::select! {
                    event = ui_rx.recv() => {
                        let Some(event) = event else { break };
                        let closed = matches!(event, stickies_ipc::UiEvent::Closed);
                        write_message(&mut writer, &event).await?;
                        if closed {
                            break;
                        }
                    }
                    line = lines.next_line() => {
                        let Some(line) = line? else { break };
                        match decode_line::<IpcCommand>(&line) {
                            Ok(IpcCommand::ConfirmReply { request_id, confirmed }) => {
                                resolve_confirm(&broker, request_id, confirmed);
                            }
                            Ok(cmd) if cmd.is_fire_and_forget() => {
                                // Failures are logged by the handler, nobody reads the reply
                                let (resp_tx, _resp_rx) = oneshot::channel();
                                let event = DaemonEvent::IpcCommand { cmd, responder: resp_tx };
                                if event_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Ok(other) => warn!("Ignoring {:?} on a UI channel", other),
                            Err(e) => warn!("Ignoring malformed UI channel line: {}", e),
                        }
                    }
                }
            }
        }
        cmd => {
            let (resp_tx, resp_rx) = oneshot::channel();
            let event = DaemonEvent::IpcCommand {
                cmd,
                responder: resp_tx,
            };
            let response = dispatch(&event_tx, event, resp_rx).await;
            write_message(&mut writer, &response).await?;
        }
    }

    Ok(())
}

/// Send an event to the loop and wait for its response.
async fn dispatch(
    event_tx: &mpsc::Sender<DaemonEvent>,
    event: DaemonEvent,
    resp_rx: oneshot::Receiver<IpcResponse>,
) -> IpcResponse {
    if event_tx.send(event).await.is_err() {
        return IpcResponse::error("Daemon is shutting down");
    }
    match resp_rx.await {
        Ok(resp) => resp,
        Err(_) => IpcResponse::error("Failed to get response from daemon"),
    }
}

fn resolve_confirm(broker: &ConfirmBroker, request_id: u64, confirmed: bool) -> IpcResponse {
    if broker.resolve(request_id, confirmed) {
        debug!("Confirm request {} answered: {}", request_id, confirmed);
        IpcResponse::Ok
    } else {
        IpcResponse::error(format!("No pending confirmation with id {}", request_id))
    }
}

/// Check if another daemon instance is already answering on `address`.
async fn check_already_running(address: &str) -> bool {
    TcpStream::connect(address).await.is_ok()
}

/// Map a configured log level to a tracing level.
fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO, // default fallback for invalid values
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(parse_log_level(level)).into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (needed for log level)
    let mut config = Config::load().unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });

    init_logging(&config.behavior.log_level)?;

    // Validate and clamp config values
    let config_warnings = config.validate();
    for w in &config_warnings {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("Stickies daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if check_already_running(&config.ipc.address).await {
        error!(
            "Another stickies daemon is already running (listening on {})",
            config.ipc.address
        );
        return Ok(());
    }

    let data_file = config.storage.data_file.clone();
    let store = match ConfigStore::load(&data_file) {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot start: {}", e);
            return Err(e).with_context(|| {
                format!("Failed to load note document {}", data_file.display())
            });
        }
    };
    info!(
        "Loaded {} window record(s) from {}",
        store.document().windows.len(),
        data_file.display()
    );

    let mut state = AppState::new(&config, store);
    state.start().context("Failed to create startup windows")?;

    let listener = TcpListener::bind(&config.ipc.address)
        .await
        .with_context(|| format!("Failed to listen on {}", config.ipc.address))?;
    let local: SocketAddr = listener.local_addr()?;
    info!("IPC server listening on {}", local);

    let (event_tx, event_rx) = mpsc::channel::<DaemonEvent>(100);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let broker = state.session.host().confirm_broker();
    let server = tokio::spawn(run_ipc_server(
        listener,
        event_tx.clone(),
        broker,
        config.read_timeout(),
    ));

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });
    drop(event_tx);

    let mut state = run_event_loop(state, event_rx, shutdown_rx).await;
    server.abort();

    state
        .shutdown()
        .context("Failed to persist note document on shutdown")?;
    info!("Stickies daemon stopped");
    Ok(())
}
