//! Engine facade: session lifecycle, start-supersession, and dependency
//! wiring.
//!
//! At most one session runs at a time. Starts are serialized by an
//! in-flight guard and stamped with a generation counter; a stop (or a
//! newer start) bumps the counter, and an async start that discovers it is
//! stale releases whatever it acquired instead of going live. That keeps
//! rapid toggle-toggle hotkey presses from leaking a capture stream or
//! racing two recognizers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::{AudioCapture, CloudTranscriber, NativeBackend};
use crate::session::{Session, SessionCmd};
use crate::settings::{BackendKind, SettingsProvider};
use crate::sink::{RefinementService, TextSink};
use crate::state::{SessionState, StateMachine};

/// Everything a session needs from the host, behind trait objects.
pub struct EngineDeps {
    pub capture: Arc<dyn AudioCapture>,
    pub native: Arc<dyn NativeBackend>,
    pub cloud: Arc<dyn CloudTranscriber>,
    pub refiner: Arc<dyn RefinementService>,
    pub sink: Arc<dyn TextSink>,
    pub settings: Arc<dyn SettingsProvider>,
}

struct ActiveSession {
    cmd_tx: mpsc::Sender<SessionCmd>,
    task: JoinHandle<()>,
}

pub struct DictationEngine {
    deps: Arc<EngineDeps>,
    state: StateMachine,
    /// Bumped by every start and stop; an async start compares its stamp
    /// against this before going live.
    start_seq: AtomicU64,
    start_in_flight: AtomicBool,
    active: tokio::sync::Mutex<Option<ActiveSession>>,
    on_close: std::sync::Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl DictationEngine {
    pub fn new(deps: EngineDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            state: StateMachine::new(),
            start_seq: AtomicU64::new(0),
            start_in_flight: AtomicBool::new(false),
            active: tokio::sync::Mutex::new(None),
            on_close: std::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Callback fired after a stop that asked for the host surface to close.
    pub fn set_on_close(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_close.lock().expect("on_close mutex poisoned") = Some(Box::new(callback));
    }

    fn notify_close(&self) {
        if let Some(callback) = self
            .on_close
            .lock()
            .expect("on_close mutex poisoned")
            .as_ref()
        {
            callback();
        }
    }

    /// Starts a new dictation session, superseding any active one. A second
    /// call while a start is already in flight is a no-op.
    pub async fn start_session(&self) -> Result<()> {
        if self.start_in_flight.swap(true, Ordering::SeqCst) {
            info!(target: "sotto::engine", "start already in flight, ignoring");
            return Ok(());
        }
        let result = self.start_inner().await;
        self.start_in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn start_inner(&self) -> Result<()> {
        let generation = self.start_seq.fetch_add(1, Ordering::SeqCst) + 1;

        self.shutdown_active().await;

        let mut settings = self.deps.settings.snapshot();
        if settings.backend == BackendKind::Cloud && !settings.has_api_key {
            warn!(target: "sotto::engine", "cloud backend selected without an API key, using native");
            settings.backend = BackendKind::Native;
        }

        if let Err(err) = self.deps.capture.start().await {
            if let Err(state_err) = self.state.transition(SessionState::Error) {
                warn!(target: "sotto::engine", "{state_err:#}");
            }
            return Err(err).context("failed to start audio capture");
        }
        if self.is_stale(generation) {
            info!(target: "sotto::engine", "start superseded after capture start");
            self.deps.capture.stop().await;
            return Ok(());
        }

        let events = if settings.backend == BackendKind::Native {
            match self.deps.native.start(&settings.language).await {
                Ok(events) => Some(events),
                Err(err) => {
                    self.deps.capture.stop().await;
                    if let Err(state_err) = self.state.transition(SessionState::Error) {
                        warn!(target: "sotto::engine", "{state_err:#}");
                    }
                    return Err(err).context("failed to start speech recognizer");
                }
            }
        } else {
            None
        };
        if self.is_stale(generation) {
            info!(target: "sotto::engine", "start superseded after recognizer start");
            if events.is_some() {
                self.deps.native.stop().await;
            }
            self.deps.capture.stop().await;
            return Ok(());
        }

        self.state
            .transition(SessionState::Listening)
            .context("session start raced another lifecycle change")?;

        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let session = Session::new(self.deps.clone(), self.state.clone(), settings.clone());
        let task = match events {
            Some(events) => tokio::spawn(session.run_native(events, cmd_rx)),
            None => tokio::spawn(session.run_cloud(cmd_rx)),
        };

        let mut active = self.active.lock().await;
        // Acquiring the slot is itself a suspension point; a stop that
        // landed while we waited must win, or the session it never saw
        // would keep running.
        if self.is_stale(generation) {
            info!(target: "sotto::engine", "start superseded before registration");
            let _ = cmd_tx.send(SessionCmd::Stop).await;
            if let Err(err) = task.await {
                warn!(target: "sotto::engine", "session task failed: {err}");
                self.state.reset();
            }
            return Ok(());
        }
        *active = Some(ActiveSession { cmd_tx, task });
        drop(active);
        info!(
            target: "sotto::engine",
            "session started (backend={:?}, lang={})",
            settings.backend,
            settings.language
        );
        Ok(())
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.start_seq.load(Ordering::SeqCst) != generation
    }

    /// Stops the active session (if any), waiting for finalization to
    /// finish. With `close_after`, fires the close callback once done.
    pub async fn stop_session(&self, close_after: bool) {
        // Invalidate any start still in flight.
        self.start_seq.fetch_add(1, Ordering::SeqCst);
        self.shutdown_active().await;
        if close_after {
            self.notify_close();
        }
    }

    async fn shutdown_active(&self) {
        let active = self.active.lock().await.take();
        if let Some(active) = active {
            if active.cmd_tx.send(SessionCmd::Stop).await.is_err() {
                // Session task already exited on its own.
            }
            if let Err(err) = active.task.await {
                warn!(target: "sotto::engine", "session task failed: {err}");
                self.state.reset();
            }
        }
    }
}
