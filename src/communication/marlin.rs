// src/communication/marlin.rs - Ack-gated command streaming to a Marlin controller
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use winder_shared::config::SerialConfig;
use winder_shared::gcode;
use winder_shared::protocol::{PAUSE_COMMAND, RESUME_COMMAND, Response};
use winder_shared::{SerialInterface, SerialTransport, TransportError};

const READ_BUFFER_SIZE: usize = 1024;

/// Longest inbound line kept while waiting for its terminator.
const MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug, Error)]
pub enum PortError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Cannot {action} while {state:?}")]
    IllegalTransition {
        action: &'static str,
        state: PauseState,
    },
    #[error("Port is not initialized")]
    NotInitialized,
    #[error("Serial link lost")]
    LinkLost,
}

/// Where the port is in the pause / resume handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Ready,
    /// `M0` sent, waiting for the controller to confirm.
    Pausing,
    Paused,
    /// `M108` sent, waiting for the controller to confirm.
    Resuming,
}

/// Port connection statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortStats {
    pub commands_sent: u64,
    pub acks_received: u64,
    pub comments_skipped: u64,
    pub busy_lines: u64,
    pub unrecognized_lines: u64,
    pub protocol_violations: u64,
    pub dispatch_attempts: u64,
}

#[derive(Debug, Clone)]
pub struct PortOptions {
    /// Log every transmitted command at info level.
    pub verbose: bool,
    pub write_timeout: Duration,
}

impl Default for PortOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            write_timeout: Duration::from_millis(1000),
        }
    }
}

impl PortOptions {
    pub fn from_config(config: &SerialConfig, verbose: bool) -> Self {
        Self {
            verbose,
            write_timeout: config.write_timeout(),
        }
    }
}

/// Reader and writer tasks of one open transport.
struct Link {
    outbound: mpsc::UnboundedSender<String>,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn close(self) {
        self.alive.store(false, Ordering::Release);
        self.reader.abort();
        self.writer.abort();
    }
}

/// Everything the caller and the reader task both touch. Only ever mutated
/// with the session lock held.
struct Session {
    link: Option<Link>,
    queue: VecDeque<String>,
    awaiting_ack: bool,
    pause_state: PauseState,
    stats: PortStats,
    verbose: bool,
    idle: Arc<Notify>,
}

impl Session {
    fn transmit(&mut self, command: String) -> bool {
        match &self.link {
            Some(link) => link.outbound.send(command).is_ok(),
            None => false,
        }
    }

    /// Sends the next queued command if nothing is in flight and the machine
    /// is not paused. Comments are logged and consumed on the way.
    fn try_dispatch(&mut self) {
        self.stats.dispatch_attempts += 1;

        while self.link.is_some() && !self.awaiting_ack && self.pause_state == PauseState::Ready {
            let Some(command) = self.queue.pop_front() else {
                break;
            };

            if let Some(text) = gcode::comment_payload(&command) {
                tracing::info!("{}", text);
                self.stats.comments_skipped += 1;
                continue;
            }

            if self.verbose {
                tracing::info!("Sending '{}'", command);
            } else {
                tracing::debug!("Serial TX: {}", command);
            }

            if self.transmit(command.clone()) {
                self.awaiting_ack = true;
                self.stats.commands_sent += 1;
            } else {
                tracing::error!("Serial writer is gone, keeping '{}' queued", command);
                self.queue.push_front(command);
                break;
            }
        }

        if self.queue.is_empty() && !self.awaiting_ack {
            self.idle.notify_waiters();
        }
    }

    fn receive(&mut self, line: &str) {
        match Response::classify(line) {
            Response::Ack => {
                self.stats.acks_received += 1;
                self.awaiting_ack = false;
                self.try_dispatch();
            }
            Response::Busy => {
                self.stats.busy_lines += 1;
            }
            Response::PauseConfirmed => {
                if self.pause_state == PauseState::Pausing {
                    self.pause_state = PauseState::Paused;
                    tracing::info!("Machine paused.");
                } else {
                    self.stats.protocol_violations += 1;
                    tracing::warn!(
                        "Saw pause confirmation while {:?}, ignoring",
                        self.pause_state
                    );
                }
            }
            Response::ResumeConfirmed => {
                if self.pause_state == PauseState::Resuming {
                    self.pause_state = PauseState::Ready;
                    tracing::info!("Machine resumed.");
                    self.try_dispatch();
                } else {
                    self.stats.protocol_violations += 1;
                    tracing::warn!(
                        "Saw resume confirmation while {:?}, ignoring",
                        self.pause_state
                    );
                }
            }
            Response::Unrecognized(other) => {
                self.stats.unrecognized_lines += 1;
                tracing::warn!("Got unexpected response: '{}'", other);
            }
        }
    }
}

/// Streams G-code to a Marlin-style controller, one command per `ok`.
///
/// - Commands queue in FIFO order; at most one is unacknowledged at a time.
/// - `pause` / `resume` bypass the queue and complete when the controller
///   sends its notification, not on `ok`.
/// - A background reader feeds every inbound line to [`handle_line`](Self::handle_line).
///
/// Must be used inside a tokio runtime.
pub struct MarlinPort {
    interface: Arc<dyn SerialInterface>,
    options: PortOptions,
    session: Arc<Mutex<Session>>,
    idle: Arc<Notify>,
    /// Reader and writer of the open link, reachable without the session lock.
    tasks: std::sync::Mutex<Vec<AbortHandle>>,
}

impl MarlinPort {
    pub fn new(interface: Arc<dyn SerialInterface>, options: PortOptions) -> Self {
        let idle = Arc::new(Notify::new());
        let session = Session {
            link: None,
            queue: VecDeque::new(),
            awaiting_ack: false,
            pause_state: PauseState::Ready,
            stats: PortStats::default(),
            verbose: options.verbose,
            idle: idle.clone(),
        };
        Self {
            interface,
            options,
            session: Arc::new(Mutex::new(session)),
            idle,
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Opens the transport and starts the reader and writer tasks. Calling it
    /// again on an open port does nothing.
    pub async fn initialize(&self) -> Result<(), PortError> {
        let mut session = self.session.lock().await;
        if session.link.is_some() {
            return Ok(());
        }

        session.awaiting_ack = false;
        let transport = self.interface.open().await?;
        tracing::info!("Port '{}' opened", self.interface.describe());

        let alive = Arc::new(AtomicBool::new(true));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(
            transport.clone(),
            self.session.clone(),
            alive.clone(),
            self.idle.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            transport,
            outbound_rx,
            reader.abort_handle(),
            self.options.write_timeout,
            alive.clone(),
            self.idle.clone(),
        ));

        *self.tasks.lock().unwrap_or_else(PoisonError::into_inner) =
            vec![reader.abort_handle(), writer.abort_handle()];
        session.link = Some(Link { outbound, alive, reader, writer });
        session.try_dispatch();
        Ok(())
    }

    /// Adds a command to the end of the queue. Commands queued before
    /// `initialize` are held until the port opens.
    pub async fn queue_command(&self, line: impl Into<String>) {
        let mut session = self.session.lock().await;
        session.queue.push_back(line.into());
        session.try_dispatch();
    }

    /// Receive rule for one inbound line from the controller.
    pub async fn handle_line(&self, line: &str) {
        self.session.lock().await.receive(line);
    }

    pub async fn pause(&self) -> Result<(), PortError> {
        let mut session = self.session.lock().await;
        if session.link.is_none() {
            tracing::warn!("Cannot pause, port is not initialized");
            return Err(PortError::NotInitialized);
        }
        if session.pause_state != PauseState::Ready {
            tracing::warn!("Cannot pause when already paused or resuming!");
            return Err(PortError::IllegalTransition {
                action: "pause",
                state: session.pause_state,
            });
        }
        if !session.transmit(PAUSE_COMMAND.to_string()) {
            return Err(PortError::LinkLost);
        }
        session.pause_state = PauseState::Pausing;
        tracing::info!("Pausing machine");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), PortError> {
        let mut session = self.session.lock().await;
        if session.link.is_none() {
            tracing::warn!("Cannot resume, port is not initialized");
            return Err(PortError::NotInitialized);
        }
        if session.pause_state != PauseState::Paused {
            tracing::warn!("Cannot resume when already resuming or not paused!");
            return Err(PortError::IllegalTransition {
                action: "resume",
                state: session.pause_state,
            });
        }
        if !session.transmit(RESUME_COMMAND.to_string()) {
            return Err(PortError::LinkLost);
        }
        session.pause_state = PauseState::Resuming;
        tracing::info!("Resuming machine");
        Ok(())
    }

    /// Drops every queued command and closes the link. `initialize` must be
    /// called again before anything is sent.
    pub async fn reset(&self) {
        let mut session = self.session.lock().await;
        if let Some(link) = session.link.take() {
            link.close();
        }
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).clear();
        session.queue.clear();
        session.awaiting_ack = false;
        session.pause_state = PauseState::Ready;
        self.idle.notify_waiters();
        tracing::info!("Port '{}' reset", self.interface.describe());
    }

    /// Resolves once the queue is empty and the last command was acknowledged.
    pub async fn wait_until_drained(&self) -> Result<(), PortError> {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let session = self.session.lock().await;
                if session.queue.is_empty() && !session.awaiting_ack {
                    return Ok(());
                }
                match &session.link {
                    None => return Err(PortError::NotInitialized),
                    Some(link) if !link.is_alive() => return Err(PortError::LinkLost),
                    Some(_) => {}
                }
            }

            notified.await;
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.lock().await.link.is_some()
    }

    pub async fn is_link_alive(&self) -> bool {
        self.session.lock().await.link.as_ref().is_some_and(Link::is_alive)
    }

    /// True while pausing or paused.
    pub async fn is_paused(&self) -> bool {
        matches!(
            self.session.lock().await.pause_state,
            PauseState::Pausing | PauseState::Paused
        )
    }

    pub async fn pause_state(&self) -> PauseState {
        self.session.lock().await.pause_state
    }

    pub async fn awaiting_ack(&self) -> bool {
        self.session.lock().await.awaiting_ack
    }

    /// Number of commands still queued (not counting the one in flight).
    pub async fn pending(&self) -> usize {
        self.session.lock().await.queue.len()
    }

    pub async fn stats(&self) -> PortStats {
        self.session.lock().await.stats.clone()
    }
}

impl Drop for MarlinPort {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for MarlinPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarlinPort")
            .field("interface", &self.interface.describe())
            .field("options", &self.options)
            .finish()
    }
}

async fn read_loop(
    transport: Arc<dyn SerialTransport>,
    session: Arc<Mutex<Session>>,
    alive: Arc<AtomicBool>,
    idle: Arc<Notify>,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        match transport.read(&mut buf).await {
            Ok(0) => {
                tracing::info!("{}", TransportError::Closed);
                break;
            }
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                while let Some(end) = pending.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = pending.drain(..=end).collect();
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    tracing::debug!("Serial RX: {}", line);
                    session.lock().await.receive(line);
                }
                if pending.len() > MAX_LINE_LENGTH {
                    tracing::warn!(
                        "Discarding {} bytes received without a line terminator",
                        pending.len()
                    );
                    pending.clear();
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                tracing::error!("{}", TransportError::Read(e));
                break;
            }
        }
    }

    alive.store(false, Ordering::Release);
    idle.notify_waiters();
    tracing::info!("Serial reader task terminated");
}

async fn write_loop(
    transport: Arc<dyn SerialTransport>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    reader: AbortHandle,
    write_timeout: Duration,
    alive: Arc<AtomicBool>,
    idle: Arc<Notify>,
) {
    while let Some(command) = outbound.recv().await {
        let command_with_newline = format!("{}\n", command);
        let write = transport.write_all(command_with_newline.as_bytes());
        match tokio::time::timeout(write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("{}", TransportError::Write(e));
                break;
            }
            Err(_) => {
                tracing::error!("{}", TransportError::WriteTimeout(write_timeout));
                break;
            }
        }
    }

    // a dead writer leaves nothing for the reader to acknowledge
    reader.abort();
    alive.store(false, Ordering::Release);
    idle.notify_waiters();
    tracing::info!("Serial writer task terminated");
}
