//! One dictation session, run to completion on its own task.
//!
//! All mutable session state lives inside the task; the outside world talks
//! to it through a command channel. The native path consumes a typed event
//! stream from the recognizer and flushes reconciled suffixes into the
//! dispatch queue on timer ticks, silence, final hypotheses, stream end, and
//! stop. The cloud path polls full-session transcriptions, merges them into
//! a combined transcript, and types refined append-only deltas.
//!
//! Finalization is bounded everywhere: the queue drain, the late-event wait,
//! and each delivery retry have hard ceilings, so a stop request always
//! reaches `Idle` in bounded time even when the sink rejects every
//! insertion.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};

use crate::backend::BackendEvent;
use crate::engine::EngineDeps;
use crate::queue::{FlushReason, SuffixQueue, NATIVE_MAX_TYPE_RETRIES, TYPE_RETRY_BACKOFF};
use crate::settings::EngineSettings;
use crate::state::{SessionState, StateMachine};
use crate::transcript::{
    compute_append_only_delta, format_delta, merge_chunks, normalize, scrub_transcript,
};

/// Periodic flush of the current partial hypothesis.
pub(crate) const FLUSH_TIMER_INTERVAL: Duration = Duration::from_millis(4000);
/// Quiet time after the last transcript event before a silence flush.
pub(crate) const SILENCE_FLUSH_AFTER: Duration = Duration::from_millis(1200);
/// Ceiling on the queue-drain phase of finalization.
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_millis(3000);
/// Poll step while waiting for the queue to empty.
pub(crate) const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(120);
/// Ceiling on the late-event wait after the backend is told to stop.
pub(crate) const LATE_EVENT_TIMEOUT: Duration = Duration::from_millis(2800);
/// Quiet time after the last late transcript before finalization settles.
pub(crate) const SETTLE_GRACE: Duration = Duration::from_millis(350);
/// Cloud transcription poll cadence.
pub(crate) const CLOUD_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// Consecutive cloud poll failures tolerated before the session errors out.
pub(crate) const CLOUD_FAILURE_LIMIT: u32 = 3;
/// Debounce between the combined transcript changing and a refinement run.
pub(crate) const REFINE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Deadline far enough out that a disarmed `select!` timer never fires.
fn never() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

#[derive(Debug)]
pub(crate) enum SessionCmd {
    Stop,
}

pub(crate) struct Session {
    deps: Arc<EngineDeps>,
    state: StateMachine,
    settings: EngineSettings,
    queue: SuffixQueue,
    /// Everything successfully inserted into the sink this session.
    live_typed: String,
    /// Best-effort full transcript, merged across segments and snapshots.
    combined: String,
    /// Latest scrubbed hypothesis for the in-flight utterance.
    partial: String,
    last_transcript_at: Option<Instant>,
    backend_ended: bool,
    refine_seq: u64,
    last_refined_input: String,
}

impl Session {
    pub(crate) fn new(deps: Arc<EngineDeps>, state: StateMachine, settings: EngineSettings) -> Self {
        Self {
            deps,
            state,
            settings,
            queue: SuffixQueue::new(),
            live_typed: String::new(),
            combined: String::new(),
            partial: String::new(),
            last_transcript_at: None,
            backend_ended: false,
            refine_seq: 0,
            last_refined_input: String::new(),
        }
    }

    // ===== native path =====

    pub(crate) async fn run_native(
        mut self,
        mut events: mpsc::Receiver<BackendEvent>,
        mut cmds: mpsc::Receiver<SessionCmd>,
    ) {
        info!(target: "sotto::session", "native session started (lang={})", self.settings.language);

        let mut flush_timer = interval_at(Instant::now() + FLUSH_TIMER_INTERVAL, FLUSH_TIMER_INTERVAL);
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events_open = true;

        loop {
            let silence_deadline = self
                .last_transcript_at
                .map(|t| t + SILENCE_FLUSH_AFTER)
                .unwrap_or_else(never);

            tokio::select! {
                cmd = cmds.recv() => {
                    match cmd {
                        Some(SessionCmd::Stop) | None => {
                            self.finalize_native(&mut events, &mut events_open).await;
                            return;
                        }
                    }
                }
                event = events.recv(), if events_open => {
                    match event {
                        Some(event) => self.handle_native_event(event).await,
                        None => {
                            events_open = false;
                            self.backend_ended = true;
                            self.flush_partial(FlushReason::Ended).await;
                        }
                    }
                    if self.state.current() == SessionState::Error {
                        self.abort_native().await;
                        return;
                    }
                }
                _ = flush_timer.tick() => {
                    self.flush_partial(FlushReason::Timer).await;
                }
                _ = sleep_until(silence_deadline), if self.last_transcript_at.is_some() => {
                    self.last_transcript_at = None;
                    self.flush_partial(FlushReason::Silence).await;
                }
            }
        }
    }

    async fn handle_native_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Ready => {
                debug!(target: "sotto::session", "recognizer ready");
            }
            BackendEvent::Transcript { text, is_final } => {
                let cleaned = normalize(&scrub_transcript(&text));
                if cleaned.is_empty() {
                    return;
                }
                self.partial = cleaned;
                self.last_transcript_at = Some(Instant::now());
                if is_final {
                    self.flush_partial(FlushReason::Final).await;
                }
            }
            BackendEvent::Ended => {
                self.backend_ended = true;
                self.flush_partial(FlushReason::Ended).await;
            }
            BackendEvent::Error(message) => {
                error!(target: "sotto::session", "recognizer error: {message}");
                self.fail_session();
            }
        }
    }

    /// Error teardown: one drain attempt for whatever is already queued,
    /// then release the recognizer and the capture stream. The in-flight
    /// partial is abandoned; an erroring recognizer's last hypothesis is
    /// not trustworthy enough to type.
    async fn abort_native(&mut self) {
        self.queue
            .drain(self.deps.sink.as_ref(), &mut self.live_typed)
            .await;
        self.deps.native.stop().await;
        self.deps.capture.stop().await;
    }

    fn fail_session(&mut self) {
        if let Err(err) = self.state.transition(SessionState::Error) {
            warn!(target: "sotto::session", "{err:#}");
            self.state.reset();
        }
    }

    /// Flushes the current partial hypothesis into the dispatch queue and
    /// drains it. Utterance-terminating reasons reset the extraction anchor
    /// so the next segment starts fresh.
    async fn flush_partial(&mut self, reason: FlushReason) {
        if self.partial.trim().is_empty() {
            return;
        }
        let snapshot = std::mem::take(&mut self.partial);
        self.combined = merge_chunks(&self.combined, &snapshot);

        let queued = self.queue.enqueue(reason, &snapshot);

        match reason {
            FlushReason::Final | FlushReason::Ended => {
                self.queue.reset_anchor();
                self.last_transcript_at = None;
            }
            _ => {
                // Partial stays live for further extension.
                self.partial = snapshot;
            }
        }

        if queued {
            self.queue
                .drain(self.deps.sink.as_ref(), &mut self.live_typed)
                .await;
        }
    }

    /// Stop path: flush, drain with a hard ceiling, wait out late recognizer
    /// events, then fall back to pasting the combined transcript if nothing
    /// was ever typed.
    async fn finalize_native(
        &mut self,
        events: &mut mpsc::Receiver<BackendEvent>,
        events_open: &mut bool,
    ) {
        if let Err(err) = self.state.transition(SessionState::Processing) {
            warn!(target: "sotto::session", "{err:#}");
        }
        info!(target: "sotto::session", "finalizing native session");

        self.flush_partial(FlushReason::Stop).await;

        let drain_deadline = Instant::now() + DRAIN_TIMEOUT;
        while !self.queue.is_empty() && Instant::now() < drain_deadline {
            self.queue
                .drain(self.deps.sink.as_ref(), &mut self.live_typed)
                .await;
            if !self.queue.is_empty() {
                sleep(DRAIN_POLL_INTERVAL).await;
            }
        }
        if !self.queue.is_empty() {
            warn!(target: "sotto::session", "drain timeout reached with items pending");
            self.queue.clear();
        }

        self.deps.native.stop().await;

        // Recognizers often emit one last hypothesis after stop. Consume it,
        // but never wait past the ceiling.
        let late_deadline = Instant::now() + LATE_EVENT_TIMEOUT;
        loop {
            let settled = self.backend_ended
                && self.queue.is_empty()
                && self
                    .last_transcript_at
                    .map_or(true, |t| t.elapsed() >= SETTLE_GRACE);
            if settled || Instant::now() >= late_deadline {
                break;
            }

            tokio::select! {
                event = events.recv(), if *events_open => {
                    match event {
                        Some(event) => self.handle_native_event(event).await,
                        None => {
                            *events_open = false;
                            self.backend_ended = true;
                            self.flush_partial(FlushReason::Ended).await;
                        }
                    }
                }
                _ = sleep(DRAIN_POLL_INTERVAL) => {
                    self.queue
                        .drain(self.deps.sink.as_ref(), &mut self.live_typed)
                        .await;
                }
            }
        }
        self.queue.clear();

        self.deps.capture.stop().await;
        self.deliver_fallback().await;

        if let Err(err) = self.state.transition(SessionState::Idle) {
            warn!(target: "sotto::session", "{err:#}");
            self.state.reset();
        }
        info!(target: "sotto::session", "native session finished");
    }

    // ===== cloud path =====

    pub(crate) async fn run_cloud(mut self, mut cmds: mpsc::Receiver<SessionCmd>) {
        info!(target: "sotto::session", "cloud session started (lang={})", self.settings.language);

        let mut poll_timer = interval_at(Instant::now() + CLOUD_POLL_INTERVAL, CLOUD_POLL_INTERVAL);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut failures: u32 = 0;
        let mut refine_at: Option<Instant> = None;

        loop {
            let refine_deadline = refine_at.unwrap_or_else(never);

            tokio::select! {
                cmd = cmds.recv() => {
                    match cmd {
                        Some(SessionCmd::Stop) | None => {
                            self.finalize_cloud().await;
                            return;
                        }
                    }
                }
                _ = poll_timer.tick() => {
                    match self.deps.cloud.transcribe_session(&self.settings.language).await {
                        Ok(text) => {
                            failures = 0;
                            let cleaned = normalize(&scrub_transcript(&text));
                            if !cleaned.is_empty() {
                                let merged = merge_chunks(&self.combined, &cleaned);
                                if merged != self.combined {
                                    self.combined = merged;
                                    refine_at = Some(Instant::now() + REFINE_DEBOUNCE);
                                }
                            }
                        }
                        Err(err) => {
                            failures += 1;
                            warn!(
                                target: "sotto::session",
                                "cloud transcription poll failed ({failures}/{CLOUD_FAILURE_LIMIT}): {err:#}"
                            );
                            if failures >= CLOUD_FAILURE_LIMIT {
                                error!(target: "sotto::session", "cloud backend unavailable, ending session");
                                self.deps.capture.stop().await;
                                self.fail_session();
                                return;
                            }
                        }
                    }
                }
                _ = sleep_until(refine_deadline), if refine_at.is_some() => {
                    refine_at = None;
                    self.run_refinement(false).await;
                }
            }
        }
    }

    /// Refines the combined transcript and types the append-only delta
    /// against what is already on screen. A stale result (the combined
    /// transcript moved on while the refiner ran) is discarded unless this
    /// is the forced finalization pass.
    async fn run_refinement(&mut self, force: bool) {
        let input = self.combined.clone();
        if input.trim().is_empty() {
            return;
        }
        if !force && input == self.last_refined_input {
            return;
        }

        self.refine_seq += 1;
        let seq = self.refine_seq;

        let refined = match self.deps.refiner.refine(&input).await {
            Ok(text) => {
                let text = normalize(&text);
                if text.is_empty() {
                    input.clone()
                } else {
                    text
                }
            }
            Err(err) => {
                warn!(target: "sotto::session", "refinement failed, using raw transcript: {err:#}");
                input.clone()
            }
        };

        if !force && seq != self.refine_seq {
            debug!(target: "sotto::session", "discarding stale refinement result");
            return;
        }
        self.last_refined_input = input;

        let delta = compute_append_only_delta(&self.live_typed, &refined);
        let text = format_delta(&self.live_typed, &delta);
        if text.is_empty() {
            return;
        }
        if self.deliver_with_retry(&text).await {
            self.live_typed.push_str(&text);
        }
    }

    async fn finalize_cloud(&mut self) {
        if let Err(err) = self.state.transition(SessionState::Processing) {
            warn!(target: "sotto::session", "{err:#}");
        }
        info!(target: "sotto::session", "finalizing cloud session");

        self.deps.capture.stop().await;

        match self
            .deps
            .cloud
            .transcribe_session(&self.settings.language)
            .await
        {
            Ok(text) => {
                let cleaned = normalize(&scrub_transcript(&text));
                if !cleaned.is_empty() {
                    self.combined = merge_chunks(&self.combined, &cleaned);
                }
            }
            Err(err) => {
                warn!(target: "sotto::session", "final cloud transcription failed: {err:#}");
            }
        }

        self.run_refinement(true).await;
        self.deliver_fallback().await;

        if let Err(err) = self.state.transition(SessionState::Idle) {
            warn!(target: "sotto::session", "{err:#}");
            self.state.reset();
        }
        info!(target: "sotto::session", "cloud session finished");
    }

    // ===== shared delivery =====

    /// If nothing reached the sink all session but we did hear the user,
    /// deliver the whole combined transcript in one insertion.
    async fn deliver_fallback(&mut self) {
        if !self.live_typed.trim().is_empty() || self.combined.trim().is_empty() {
            return;
        }
        info!(target: "sotto::session", "no live text delivered, inserting combined transcript");
        let text = self.combined.clone();
        if self.deliver_with_retry(&text).await {
            self.live_typed = text;
        } else {
            warn!(target: "sotto::session", "combined transcript delivery failed");
        }
    }

    async fn deliver_with_retry(&self, text: &str) -> bool {
        for attempt in 0..=NATIVE_MAX_TYPE_RETRIES {
            if self.deps.sink.insert(text).await.consumed {
                return true;
            }
            if attempt < NATIVE_MAX_TYPE_RETRIES {
                sleep(TYPE_RETRY_BACKOFF).await;
            }
        }
        false
    }
}
