//! Sotto — a live dictation engine for launcher-style overlays.
//!
//! The crate turns messy speech-backend snapshots (restated, overlapping,
//! occasionally rewritten) into an append-only stream of keystrokes for a
//! host-provided text sink. The host wires concrete audio capture, speech
//! backends, a refinement service, and a sink into [`EngineDeps`]; the
//! [`DictationEngine`] owns the session lifecycle on top of them.
//!
//! Sessions run on their own tokio task and are controlled through the
//! engine: [`DictationEngine::start_session`] supersedes any active
//! session, [`DictationEngine::stop_session`] finalizes in bounded time
//! even when the sink rejects every insertion.

pub mod backend;
pub mod queue;
pub mod settings;
pub mod sink;
pub mod state;
pub mod transcript;

mod engine;
mod session;

pub use engine::{DictationEngine, EngineDeps};
pub use queue::{FlushReason, PendingSuffix, SuffixQueue, NATIVE_MAX_TYPE_RETRIES};
pub use settings::{BackendKind, EngineSettings, SettingsProvider};
pub use sink::{InsertOutcome, RefinementService, TextSink};
pub use state::{SessionState, StateMachine};
