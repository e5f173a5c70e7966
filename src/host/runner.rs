//! Draw runner - drives a `DrawSession` on a background thread
//!
//! The host sends `DrawCommand`s and polls `RunnerEvent`s over bounded
//! channels. The runner thread sleeps until the next spin deadline (or an
//! idle poll interval), so animation timing does not depend on the host's
//! frame rate. A read-only `DrawSnapshot` is published after every step for
//! rendering and export.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::config::{Config, TableSettings};
use super::hotkey::{KeyAction, KeyBindings, KeyContext};
use crate::core::constants::{RUNNER_CHANNEL_CAPACITY, RUNNER_IDLE_POLL};
use crate::core::draw_state::{DrawState, Tally};
use crate::core::format::reel_window;
use crate::core::rate_schedule::{PatternChoice, SpinPattern};
use crate::core::session::{DrawSession, SessionEvent};
use crate::core::traits::{Clock, SystemClock};
use crate::core::types::{ParticipantTable, Prize, RowIndex};

// =============================================================================
// TYPES
// =============================================================================

/// Commands (host -> runner thread)
#[derive(Debug)]
pub enum DrawCommand {
    /// Load a table; `display_column` None picks one from the preferences
    Load {
        table: ParticipantTable,
        display_column: Option<String>,
    },
    Begin(Option<Prize>),
    Stop,
    Accept,
    Skip,
    End,
    Reset,
    CancelSpin,
    SetPattern(PatternChoice),
    /// A key press, judged against the current phase
    Key {
        key: String,
        prize: Option<Prize>,
    },
    Shutdown,
}

impl DrawCommand {
    fn name(&self) -> &'static str {
        match self {
            DrawCommand::Load { .. } => "load",
            DrawCommand::Begin(_) => "begin",
            DrawCommand::Stop => "stop",
            DrawCommand::Accept => "accept",
            DrawCommand::Skip => "skip",
            DrawCommand::End => "end",
            DrawCommand::Reset => "reset",
            DrawCommand::CancelSpin => "cancel_spin",
            DrawCommand::SetPattern(_) => "set_pattern",
            DrawCommand::Key { .. } => "key",
            DrawCommand::Shutdown => "shutdown",
        }
    }
}

/// Events (runner thread -> host)
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    Session(SessionEvent),
    Loaded {
        rows: usize,
        display_column: String,
    },
    LoadFailed(String),
    /// The named command had no effect in the current state
    Ignored(&'static str),
    /// Nobody is left to draw
    Exhausted,
    Error(String),
}

/// One reel slot with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReelSlot {
    pub index: RowIndex,
    pub offset: i32,
    pub label: String,
}

/// Read-only view of the session, refreshed by the runner thread
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawSnapshot {
    pub loaded: bool,
    pub state: DrawState,
    pub display_index: RowIndex,
    pub eligible: usize,
    pub stopping: bool,
    pub pattern: Option<SpinPattern>,
    pub reel: Vec<ReelSlot>,
    pub tally: Option<Tally>,
}

impl DrawSnapshot {
    fn capture<R: Rng>(session: &DrawSession<R>) -> Self {
        let Some(roster) = session.roster() else {
            return Self::default();
        };
        let reel = reel_window(session.display_index(), roster.row_count())
            .into_iter()
            .map(|slot| ReelSlot {
                index: slot.index,
                offset: slot.offset,
                label: roster.display_name(slot.index).to_string(),
            })
            .collect();
        Self {
            loaded: true,
            state: session.state().clone(),
            display_index: session.display_index(),
            eligible: session.eligible_rows().len(),
            stopping: session.is_stopping(),
            pattern: session.spin_pattern(),
            reel,
            tally: session.tally(),
        }
    }
}

// =============================================================================
// DRAW RUNNER
// =============================================================================

pub struct DrawRunner {
    tx: Sender<DrawCommand>,
    rx: Receiver<RunnerEvent>,
    snapshot: Arc<RwLock<DrawSnapshot>>,
    shutdown_flag: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DrawRunner {
    /// Start a runner for the draw, table and key settings of `config`
    pub fn from_config(config: &Config) -> Self {
        Self::start(
            DrawSession::new(config.draw.clone()),
            config.table.clone(),
            config.keybindings.clone(),
        )
    }

    /// Start the runner thread around an existing session
    pub fn start<R: Rng + Send + 'static>(
        session: DrawSession<R>,
        table: TableSettings,
        keybindings: KeyBindings,
    ) -> Self {
        let (command_tx, command_rx) = bounded::<DrawCommand>(RUNNER_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = bounded::<RunnerEvent>(RUNNER_CHANNEL_CAPACITY);

        let snapshot = Arc::new(RwLock::new(DrawSnapshot::default()));
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            session,
            table,
            keybindings,
            events: event_tx.clone(),
            snapshot: Arc::clone(&snapshot),
        };
        let flag = Arc::clone(&shutdown_flag);

        let handle = thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                worker.run(command_rx, flag);
            }));

            if let Err(panic_info) = result {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    format!("Runner thread panic: {}", s)
                } else {
                    "Runner thread panic".to_string()
                };
                error!("{}", msg);
                let _ = event_tx.try_send(RunnerEvent::Error(msg));
            }
        });
        info!("[RUNNER] Started");

        Self {
            tx: command_tx,
            rx: event_rx,
            snapshot,
            shutdown_flag,
            thread_handle: Some(handle),
        }
    }

    /// Queue a command; false if the queue is full or the thread is gone
    pub fn send(&self, command: DrawCommand) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("[RUNNER] Failed to queue command: {}", e);
                false
            }
        }
    }

    pub fn poll(&self) -> Option<RunnerEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next event
    pub fn poll_timeout(&self, timeout: Duration) -> Option<RunnerEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> DrawSnapshot {
        self.snapshot.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the thread and wait for it; an in-flight spin is dropped
    pub fn shutdown(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        let _ = self.tx.try_send(DrawCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            info!("[RUNNER] Stopped");
        }
    }
}

impl Drop for DrawRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// RUNNER THREAD
// =============================================================================

struct Worker<R: Rng> {
    session: DrawSession<R>,
    table: TableSettings,
    keybindings: KeyBindings,
    events: Sender<RunnerEvent>,
    snapshot: Arc<RwLock<DrawSnapshot>>,
}

impl<R: Rng> Worker<R> {
    fn run(mut self, commands: Receiver<DrawCommand>, shutdown_flag: Arc<AtomicBool>) {
        let clock = SystemClock;
        self.publish();

        loop {
            if shutdown_flag.load(Ordering::SeqCst) {
                break;
            }

            let deadline = self
                .session
                .next_deadline()
                .unwrap_or_else(|| clock.now() + RUNNER_IDLE_POLL);

            match commands.recv_deadline(deadline) {
                Ok(DrawCommand::Shutdown) => break,
                Ok(command) => self.handle(command, &clock),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            for event in self.session.update(&clock) {
                self.emit(RunnerEvent::Session(event));
            }
            self.publish();
        }

        self.session.cancel_spin();
        debug!("[RUNNER] Thread exiting");
    }

    fn handle<C: Clock>(&mut self, command: DrawCommand, clock: &C) {
        let name = command.name();
        let applied = match command {
            DrawCommand::Load {
                table,
                display_column,
            } => {
                self.load(table, display_column);
                return;
            }
            DrawCommand::Begin(prize) => self.session.begin_draw(prize, clock),
            DrawCommand::Stop => self.session.request_stop(clock),
            DrawCommand::Accept => self.decide(true),
            DrawCommand::Skip => self.decide(false),
            DrawCommand::End => self.session.end_session(),
            DrawCommand::Reset => self.session.reset(),
            DrawCommand::CancelSpin => self.session.cancel_spin(),
            DrawCommand::SetPattern(pattern) => {
                self.session.set_pattern(pattern);
                true
            }
            DrawCommand::Key { key, prize } => match self.key_action(&key, prize) {
                Some(action) => {
                    debug!(key = %key, action = ?action, "[RUNNER] Key pressed");
                    let command = match action {
                        KeyAction::Spin => DrawCommand::Begin(prize),
                        KeyAction::Stop => DrawCommand::Stop,
                        KeyAction::Accept => DrawCommand::Accept,
                        KeyAction::Skip => DrawCommand::Skip,
                        KeyAction::End => DrawCommand::End,
                    };
                    self.handle(command, clock);
                    return;
                }
                None => false,
            },
            DrawCommand::Shutdown => true,
        };
        if !applied {
            self.emit(RunnerEvent::Ignored(name));
        }
    }

    fn load(&mut self, table: ParticipantTable, display_column: Option<String>) {
        let Some(column) = display_column.or_else(|| self.table.display_column_for(&table))
        else {
            self.emit(RunnerEvent::LoadFailed("table has no columns".to_string()));
            return;
        };
        let rows = table.len();
        match self.session.reset_session(table, &column) {
            Ok(()) => self.emit(RunnerEvent::Loaded {
                rows,
                display_column: column,
            }),
            Err(e) => {
                warn!(error = %e, "[RUNNER] Load failed");
                self.emit(RunnerEvent::LoadFailed(e.to_string()));
            }
        }
    }

    fn decide(&mut self, accept: bool) -> bool {
        let applied = if accept {
            self.session.accept_pending()
        } else {
            self.session.skip_pending()
        };
        if applied && self.session.is_exhausted() {
            self.emit(RunnerEvent::Exhausted);
        }
        applied
    }

    fn key_action(&self, key: &str, prize: Option<Prize>) -> Option<KeyAction> {
        let ctx = KeyContext {
            phase: self.session.state().phase(),
            can_draw: self.session.can_draw(prize),
            stopping: self.session.is_stopping(),
        };
        self.keybindings.action_for(key, &ctx)
    }

    fn emit(&self, event: RunnerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(event = ?event, "[RUNNER] Event queue full, dropping");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn publish(&self) {
        *self.snapshot.write() = DrawSnapshot::capture(&self.session);
    }
}
