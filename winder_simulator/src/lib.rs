//! In-memory stand-in for a Marlin winder controller.
//!
//! The simulator sits on the far end of a [`ChannelInterface`] and answers
//! the host the way the firmware does: `ok` after each command, and the
//! action notifications after `M0` / `M108`. Axis positions are tracked from
//! the `G0` / `G92` traffic so a run can be checked after the fact.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use winder_shared::gcode::{self, GCodeLine};
use winder_shared::protocol::{
    ACK, BUSY_TOKENS, PAUSE_COMMAND, PAUSE_CONFIRMATION, RESUME_COMMAND, RESUME_CONFIRMATION,
};
use winder_shared::{ChannelInterface, ChannelPeer, Coordinate};

#[derive(Debug, Clone, Default)]
pub struct SimulatorOptions {
    /// Delay before each `ok`, standing in for move execution.
    pub reply_delay: Duration,
    /// Emit a busy keep-alive before every n-th acknowledgement.
    pub busy_every: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimState {
    pub position: Coordinate,
    pub feed_rate: Option<f64>,
    /// Every line the host sent, in order.
    pub received: Vec<String>,
    pub moves: u64,
    pub paused: bool,
    pub pause_count: u64,
    /// Motion or other commands that arrived between `M0` and `M108`.
    pub commands_while_paused: u64,
    /// Comment lines that reached the wire.
    pub comments_received: u64,
}

pub struct SimulatedController {
    state: Arc<Mutex<SimState>>,
    task: JoinHandle<()>,
}

impl SimulatedController {
    /// Starts answering on `peer`. Must be called inside a tokio runtime.
    pub fn spawn(peer: ChannelPeer, options: SimulatorOptions) -> Self {
        let state = Arc::new(Mutex::new(SimState::default()));
        let task = tokio::spawn(run(peer, state.clone(), options));
        Self { state, task }
    }

    /// Fresh interface for the host plus the controller answering it.
    pub fn connect(options: SimulatorOptions) -> (ChannelInterface, Self) {
        let (interface, peer) = ChannelInterface::pair();
        (interface, Self::spawn(peer, options))
    }

    pub fn state(&self) -> SimState {
        lock(&self.state).clone()
    }

    pub fn position(&self) -> Coordinate {
        lock(&self.state).position
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    /// Waits for the host to hang up, then returns the final state.
    pub async fn join(self) -> SimState {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!("Simulator task failed: {}", e);
            }
        }
        lock(&self.state).clone()
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Reply {
    Ack,
    Line(&'static str),
}

async fn run(mut peer: ChannelPeer, state: Arc<Mutex<SimState>>, options: SimulatorOptions) {
    let mut acked: usize = 0;

    while let Some(line) = peer.next_line().await {
        tracing::debug!("Sim RX: {}", line);
        let reply = {
            let mut state = lock(&state);
            state.received.push(line.clone());
            apply(&mut state, &line)
        };

        match reply {
            Reply::Line(text) => {
                if !peer.send_line(text) {
                    break;
                }
            }
            Reply::Ack => {
                if !options.reply_delay.is_zero() {
                    tokio::time::sleep(options.reply_delay).await;
                }
                acked += 1;
                if options.busy_every.is_some_and(|n| n > 0 && acked % n == 0) {
                    peer.send_line(BUSY_TOKENS[0]);
                }
                if !peer.send_line(ACK) {
                    break;
                }
            }
        }
    }

    tracing::info!("Simulated controller stopped");
}

fn apply(state: &mut SimState, line: &str) -> Reply {
    match line.trim() {
        PAUSE_COMMAND => {
            state.paused = true;
            state.pause_count += 1;
            return Reply::Line(PAUSE_CONFIRMATION);
        }
        RESUME_COMMAND => {
            state.paused = false;
            return Reply::Line(RESUME_CONFIRMATION);
        }
        _ => {}
    }

    if state.paused {
        state.commands_while_paused += 1;
    }

    match gcode::parse_line(line) {
        GCodeLine::Move { target, feed_rate } => {
            if let Some(rate) = feed_rate {
                state.feed_rate = Some(rate);
            }
            if !target.is_empty() {
                state.position = state.position.merged(&target);
                state.moves += 1;
            }
        }
        GCodeLine::SetPosition(target) => {
            state.position = state.position.merged(&target);
        }
        GCodeLine::Comment(text) => {
            state.comments_received += 1;
            tracing::warn!("Comment reached the controller: {}", text);
        }
        GCodeLine::Empty => {}
        GCodeLine::Other(command) => {
            tracing::debug!("Sim ignoring '{}'", command);
        }
    }
    Reply::Ack
}
