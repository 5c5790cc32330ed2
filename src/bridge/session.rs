//! Session actor: one end of a bridged connection.
//!
//! # Responsibilities
//! - Own the underlying transport exclusively
//! - Publish received frames and terminal events to the relay
//! - Apply send/close commands from the relay in order
//! - Expose the lifecycle state (`Connecting → Open → Closing → Closed`)
//!
//! # Data Flow
//! ```text
//!              ┌──────────── SessionHandle ────────────┐
//! transport ──▶│ read loop  ── SessionEvent   ──▶ relay │
//! transport ◀──│ write loop ◀── SessionCommand ── relay │
//!              │       state: watch<SessionState>        │
//!              └────────────────────────────────────────┘
//! ```
//!
//! # Design Decisions
//! - Reader and writer are separate tasks so a blocked event queue never
//!   stops outgoing frames from draining
//! - Events are bounded so a busy relay slows the reader down
//! - Commands are unbounded: the relay never waits on a slow peer, whose
//!   backlog queues up ahead of the transport
//! - The writer drops frames once the state has left `Open`
//! - Dropping the handle closes the transport

use std::fmt::Display;
use std::sync::Arc;

use axum::body::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::bridge::wire::{CloseReason, Wire, WireMessage};

/// Which end of the pairing a session faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The inbound socket accepted from the client.
    Client,
    /// The outbound socket opened to the backend shard.
    Backend,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Client => write!(f, "client"),
            Side::Backend => write!(f, "backend"),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// What a session reports to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A data frame arrived.
    Frame(Bytes),
    /// The peer closed the session or the stream ended.
    Closed(Option<CloseReason>),
    /// The transport failed.
    Failed(String),
}

/// What the relay asks a session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Send(Bytes),
    Close(Option<CloseReason>),
}

/// The relay's side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    side: Side,
    events: mpsc::Receiver<SessionEvent>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Start the read and write loops over an open transport.
    pub fn spawn<T, M, E>(side: Side, transport: T, capacity: usize) -> Self
    where
        T: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + 'static,
        M: WireMessage,
        E: Display + Send + 'static,
    {
        let (sink, stream) = transport.split();
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let state_tx = Arc::new(state_tx);

        tokio::spawn(read_loop(side, stream, event_tx.clone(), Arc::clone(&state_tx)));
        tokio::spawn(write_loop(side, sink, command_rx, event_tx, Arc::clone(&state_tx)));
        // The read loop may already have seen the transport fail.
        state_tx.send_if_modified(|s| {
            if *s == SessionState::Connecting {
                *s = SessionState::Open;
                true
            } else {
                false
            }
        });

        Self {
            side,
            events: event_rx,
            commands: command_tx,
            state: state_rx,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Next event from the transport. `None` once both loops have exited.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Queue a frame without waiting. Dropped unless the session is open.
    ///
    /// Returns true if the frame was queued.
    pub fn send(&self, frame: Bytes) -> bool {
        if !self.is_open() {
            return false;
        }
        self.commands.send(SessionCommand::Send(frame)).is_ok()
    }

    /// Ask the session to close after already queued frames.
    pub fn close(&self, reason: Option<CloseReason>) {
        let _ = self.commands.send(SessionCommand::Close(reason));
    }

    /// A detached handle that can only close this session.
    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            side: self.side,
            commands: self.commands.clone(),
        }
    }

    /// Wait until the session reaches `Closed`.
    pub async fn closed(&self) {
        wait_closed(self.state.clone()).await
    }

    /// A handle whose transport is simulated by the returned probe.
    #[cfg(test)]
    pub(crate) fn detached(side: Side, capacity: usize) -> (Self, SessionProbe) {
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Open);

        (
            Self {
                side,
                events: event_rx,
                commands: command_tx,
                state: state_rx,
            },
            SessionProbe {
                events: event_tx,
                commands: command_rx,
                state: state_tx,
            },
        )
    }
}

/// Closes a session without owning its handle.
#[derive(Debug, Clone)]
pub struct SessionCloser {
    side: Side,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionCloser {
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn close(&self, reason: Option<CloseReason>) {
        let _ = self.commands.send(SessionCommand::Close(reason));
    }
}

/// Test stand-in for a transport: injects events, observes commands.
#[cfg(test)]
pub(crate) struct SessionProbe {
    pub events: mpsc::Sender<SessionEvent>,
    pub commands: mpsc::UnboundedReceiver<SessionCommand>,
    pub state: watch::Sender<SessionState>,
}

async fn wait_closed(mut state: watch::Receiver<SessionState>) {
    while *state.borrow_and_update() != SessionState::Closed {
        if state.changed().await.is_err() {
            return;
        }
    }
}

async fn read_loop<S, M, E>(
    side: Side,
    mut stream: S,
    events: mpsc::Sender<SessionEvent>,
    state: Arc<watch::Sender<SessionState>>,
) where
    S: Stream<Item = Result<M, E>> + Unpin,
    M: WireMessage,
    E: Display,
{
    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            _ = wait_closed(state.subscribe()) => break,
        };

        let event = match item {
            Some(Ok(message)) => match message.into_wire() {
                Wire::Frame(frame) => SessionEvent::Frame(frame),
                Wire::Close(reason) => {
                    state.send_if_modified(|s| begin_closing(s));
                    SessionEvent::Closed(reason)
                }
                Wire::Control => continue,
            },
            Some(Err(e)) => {
                tracing::debug!(side = %side, error = %e, "Session read failed");
                state.send_replace(SessionState::Closed);
                SessionEvent::Failed(e.to_string())
            }
            None => {
                state.send_replace(SessionState::Closed);
                SessionEvent::Closed(None)
            }
        };

        let terminal = !matches!(event, SessionEvent::Frame(_));
        if events.send(event).await.is_err() || terminal {
            break;
        }
    }
    tracing::trace!(side = %side, "Session read loop finished");
}

async fn write_loop<K, M>(
    side: Side,
    mut sink: K,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::Sender<SessionEvent>,
    state: Arc<watch::Sender<SessionState>>,
) where
    K: Sink<M> + Unpin,
    K::Error: Display,
    M: WireMessage,
{
    while let Some(command) = commands.recv().await {
        match command {
            SessionCommand::Send(frame) => {
                if *state.borrow() != SessionState::Open {
                    continue;
                }
                if let Err(e) = sink.send(M::binary(frame)).await {
                    tracing::debug!(side = %side, error = %e, "Session write failed");
                    state.send_replace(SessionState::Closed);
                    let _ = events.try_send(SessionEvent::Failed(e.to_string()));
                    return;
                }
            }
            SessionCommand::Close(reason) => {
                let was_open = state.send_if_modified(|s| begin_closing(s));
                if was_open {
                    if let Err(e) = sink.send(M::close(reason)).await {
                        tracing::debug!(side = %side, error = %e, "Close frame not delivered");
                    }
                }
                break;
            }
        }
    }

    // Flushes a pending close reply when the peer closed first.
    if let Err(e) = sink.close().await {
        tracing::trace!(side = %side, error = %e, "Session sink close failed");
    }
    state.send_replace(SessionState::Closed);
    tracing::trace!(side = %side, "Session write loop finished");
}

fn begin_closing(state: &mut SessionState) -> bool {
    match state {
        SessionState::Connecting | SessionState::Open => {
            *state = SessionState::Closing;
            true
        }
        SessionState::Closing | SessionState::Closed => false,
    }
}
